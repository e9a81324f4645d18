use serde::{Deserialize, Serialize};

///
/// Cardinality
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cardinality {
    One,
    Many,
}

///
/// ReferentialAction
///
/// What the backend does to referencing rows when the referenced row is
/// deleted.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    NoAction,
}

///
/// RelationLink
///
/// Owned   → this entity holds the foreign key columns.
/// Inverse → the named relation on the target entity holds them.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RelationLink {
    Owned {
        fields: Vec<String>,
        references: Vec<String>,
        on_delete: Option<ReferentialAction>,
    },
    Inverse {
        relation: String,
    },
}

///
/// RelationModel
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationModel {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,

    /// Whether a to-one relation may be absent. Always false for to-many.
    pub nullable: bool,
    pub link: RelationLink,
}

impl RelationModel {
    /// Required many-to-one (or one-to-one) relation owning the foreign key.
    #[must_use]
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        fields: &[&str],
        references: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            nullable: false,
            link: RelationLink::Owned {
                fields: fields.iter().map(ToString::to_string).collect(),
                references: references.iter().map(ToString::to_string).collect(),
                on_delete: None,
            },
        }
    }

    /// To-many side of a relation owned by `inverse` on the target entity.
    #[must_use]
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            nullable: false,
            link: RelationLink::Inverse {
                relation: inverse.into(),
            },
        }
    }

    /// Optional to-one side of a one-to-one relation owned by the target.
    #[must_use]
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            nullable: true,
            link: RelationLink::Inverse {
                relation: inverse.into(),
            },
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let RelationLink::Owned { on_delete, .. } = &mut self.link {
            *on_delete = Some(action);
        }
        self
    }

    #[must_use]
    pub const fn is_to_many(&self) -> bool {
        matches!(self.cardinality, Cardinality::Many)
    }

    #[must_use]
    pub const fn is_owning(&self) -> bool {
        matches!(self.link, RelationLink::Owned { .. })
    }

    /// Foreign key columns and the target columns they reference.
    #[must_use]
    pub fn owned_keys(&self) -> Option<(&[String], &[String])> {
        match &self.link {
            RelationLink::Owned {
                fields, references, ..
            } => Some((fields, references)),
            RelationLink::Inverse { .. } => None,
        }
    }

    /// Effective delete action; unset actions default to `SetNull` for
    /// optional relations and `Restrict` for required ones.
    #[must_use]
    pub const fn delete_action(&self) -> Option<ReferentialAction> {
        match &self.link {
            RelationLink::Owned {
                on_delete: Some(action),
                ..
            } => Some(*action),
            RelationLink::Owned { on_delete: None, .. } if self.nullable => {
                Some(ReferentialAction::SetNull)
            }
            RelationLink::Owned { on_delete: None, .. } => Some(ReferentialAction::Restrict),
            RelationLink::Inverse { .. } => None,
        }
    }
}
