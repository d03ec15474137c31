use crate::schema::{
    app::{self, FieldId, ModelId},
    db::{ColumnId, TableId},
};
use crate::{Error, Result};

/// Defines how a model is stored in its table.
#[derive(Debug, Clone)]
pub struct Model {
    /// Model identifier
    pub id: ModelId,

    /// Table used to persist the model
    pub table: TableId,

    /// How each field is stored, in field order
    pub fields: Vec<Field>,
}

/// Storage of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The value lives in a column of the model's table.
    Column(ColumnId),

    /// The field holds the primary key of `target`, stored in `column`.
    ForeignKey {
        column: ColumnId,
        target: ModelId,
        target_field: FieldId,
    },

    /// Non-owning side of a relation; the key is stored by `pair`.
    Pair { pair: FieldId },
}

impl Model {
    /// Column storing the field, `None` if it lives on another table.
    pub fn column_for(&self, field: FieldId) -> Option<ColumnId> {
        assert_eq!(self.id, field.model);
        self.fields[field.index].column()
    }

    pub fn field(&self, field: FieldId) -> &Field {
        assert_eq!(self.id, field.model);
        &self.fields[field.index]
    }

    /// Returns the field stored in `column`.
    pub fn field_for_column(&self, column: ColumnId) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|field| field.column() == Some(column))
            .map(|index| FieldId {
                model: self.id,
                index,
            })
    }

    pub fn primary_key_columns<'a>(
        &'a self,
        model: &'a app::Model,
    ) -> impl Iterator<Item = ColumnId> + 'a {
        model
            .primary_key
            .fields
            .iter()
            .filter_map(|field| self.column_for(*field))
    }

    pub(crate) fn single_primary_key_column(&self, model: &app::Model) -> Result<ColumnId> {
        let mut columns = self.primary_key_columns(model);

        match (columns.next(), columns.next()) {
            (Some(column), None) => Ok(column),
            _ => Err(Error::invalid_schema(format!(
                "model {}: expected a single-field primary key",
                model.name
            ))),
        }
    }
}

impl Field {
    pub fn column(&self) -> Option<ColumnId> {
        match *self {
            Field::Column(column) | Field::ForeignKey { column, .. } => Some(column),
            Field::Pair { .. } => None,
        }
    }
}
