use crate::model::{field::FieldModel, relation::RelationModel};

///
/// UniqueModel
///
/// Named unique constraint. The name doubles as the compound selector key
/// in unique `where` inputs (`{ employeeId_date: { employeeId, date } }`).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniqueModel {
    pub name: String,
    pub fields: Vec<String>,
}

impl UniqueModel {
    #[must_use]
    pub fn new(fields: &[&str]) -> Self {
        Self {
            name: fields.join("_"),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub const fn is_compound(&self) -> bool {
        self.fields.len() > 1
    }
}

///
/// EntityModel
///
/// Runtime model for one entity. Field order is authoritative for result
/// shaping; the primary key is listed first among unique sets.
///

#[derive(Clone, Debug, PartialEq)]
pub struct EntityModel {
    pub name: String,
    pub fields: Vec<FieldModel>,
    pub relations: Vec<RelationModel>,
    pub primary_key: Vec<String>,
    pub uniques: Vec<UniqueModel>,
}

impl EntityModel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            relations: Vec::new(),
            primary_key: Vec::new(),
            uniques: Vec::new(),
        }
    }

    //
    // Builder
    //

    #[must_use]
    pub fn with_field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_relation(mut self, relation: RelationModel) -> Self {
        self.relations.push(relation);
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, fields: &[&str]) -> Self {
        self.primary_key = fields.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_unique(mut self, unique: UniqueModel) -> Self {
        self.uniques.push(unique);
        self
    }

    //
    // Lookup
    //

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationModel> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Primary key followed by every declared unique constraint.
    #[must_use]
    pub fn unique_sets(&self) -> Vec<UniqueModel> {
        let pk: Vec<&str> = self.primary_key.iter().map(String::as_str).collect();
        let mut sets = vec![UniqueModel::new(&pk)];
        sets.extend(self.uniques.iter().cloned());

        sets
    }

    /// Whether `fields` (in any order) exactly covers one unique set.
    #[must_use]
    pub fn is_unique_set(&self, fields: &[String]) -> bool {
        self.unique_sets().iter().any(|set| {
            set.fields.len() == fields.len() && set.fields.iter().all(|f| fields.contains(f))
        })
    }

    pub fn scalar_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}
