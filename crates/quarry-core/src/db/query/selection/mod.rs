//! Projections: which scalars, relations and relation counts a call returns.

mod build;


use crate::db::query::{predicate::Predicate, scope::Scope};

pub(crate) use build::{SelectionArgs, build_selection};

///
/// Selection
///
/// Resolved projection of one entity. `fields` are in schema order and
/// already exclude everything hidden by the omit policy.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub entity: String,
    pub fields: Vec<String>,
    pub relations: Vec<RelationSelection>,
    pub counts: Vec<RelationCount>,
}

impl Selection {
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationSelection> {
        self.relations.iter().find(|r| r.relation == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.relations.is_empty() && self.counts.is_empty()
    }
}

///
/// RelationSelection
///
/// An included relation. For to-one relations `scope` is always the
/// default; to-many relations may filter, order and paginate.
///

#[derive(Clone, Debug, PartialEq)]
pub struct RelationSelection {
    pub relation: String,
    pub target: String,
    pub to_many: bool,
    pub scope: Scope,
    pub selection: Selection,
}

///
/// RelationCount
///

#[derive(Clone, Debug, PartialEq)]
pub struct RelationCount {
    pub relation: String,
    pub filter: Predicate,
}
