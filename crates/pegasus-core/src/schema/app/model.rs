use super::{Field, FieldId};
use crate::Result;

use std::fmt;

#[derive(Debug, Clone)]
pub struct Model {
    /// Uniquely identifies the model within the schema
    pub id: ModelId,

    /// Name of the model
    pub name: String,

    /// Fields contained by the model, in declaration order
    pub fields: Vec<Field>,

    pub primary_key: PrimaryKey,

    /// If the definition specifies a table to map the model to, this is set.
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub fields: Vec<FieldId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelId(pub usize);

impl Model {
    pub fn field(&self, field: impl Into<FieldId>) -> &Field {
        let field_id = field.into();
        assert_eq!(self.id, field_id.model);
        &self.fields[field_id.index]
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks a field up by name, failing with an argument error.
    pub fn find_field(&self, name: &str) -> Result<&Field> {
        self.field_by_name(name)
            .ok_or_else(|| crate::Error::unknown_field(&self.name, name))
    }

    pub fn primary_key_fields(&self) -> impl ExactSizeIterator<Item = &Field> + '_ {
        self.primary_key
            .fields
            .iter()
            .map(|pk_field| &self.fields[pk_field.index])
    }

    /// Returns the primary key field when the key is a single field.
    pub fn single_primary_key(&self) -> Option<&Field> {
        match &self.primary_key.fields[..] {
            [field] => Some(&self.fields[field.index]),
            _ => None,
        }
    }

    /// The name of the table, before any prefix is applied.
    pub fn table_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    pub fn relations(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|field| field.is_relation())
    }
}

impl From<&Model> for ModelId {
    fn from(value: &Model) -> Self {
        value.id
    }
}

impl From<&ModelId> for ModelId {
    fn from(value: &ModelId) -> Self {
        *value
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "ModelId({})", self.0)
    }
}
