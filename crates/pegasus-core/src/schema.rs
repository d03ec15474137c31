pub mod app;

mod builder;
pub use builder::Builder;

pub mod db;

pub mod mapping;
use mapping::Mapping;

use crate::{driver::ColumnValues, stmt::Value, Result};
use app::{FieldId, ModelId};
use db::{Table, TableId};
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct Schema {
    /// Application-level schema
    pub app: app::Schema,

    /// Database-level schema
    pub db: Arc<db::Schema>,

    /// Maps the app-level schema to the db-level schema
    pub mapping: Mapping,
}

impl Schema {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn model(&self, id: impl Into<ModelId>) -> &app::Model {
        self.app.model(id)
    }

    pub fn mapping_for(&self, id: impl Into<ModelId>) -> &mapping::Model {
        self.mapping.model(id)
    }

    pub fn table_for(&self, id: impl Into<ModelId>) -> &Table {
        self.db.table(self.table_id_for(id))
    }

    pub fn table_id_for(&self, id: impl Into<ModelId>) -> TableId {
        self.mapping.model(id).table
    }

    /// Converts field values of `model` into the column values to persist
    /// or to filter by.
    ///
    /// Fields stored in a column of the model's table map directly. The
    /// non-owning side of a one-to-one relation has no column; when
    /// `search_outside` is set, it is resolved through its pair instead:
    /// `lookup(pair, counterpart_key)` must return the foreign key held by
    /// the counterpart row, which is then matched against this model's
    /// primary key. Without `search_outside` such fields are skipped.
    ///
    /// Returns `None` when `lookup` finds no counterpart: no row can match.
    pub fn prepare_columns<F>(
        &self,
        model: impl Into<ModelId>,
        values: &IndexMap<FieldId, Value>,
        search_outside: bool,
        mut lookup: F,
    ) -> Result<Option<ColumnValues>>
    where
        F: FnMut(FieldId, &Value) -> Result<Option<Value>>,
    {
        let model = self.model(model);
        let mapping = self.mapping_for(model.id);
        let mut columns = ColumnValues::new();

        for (field_id, value) in values {
            if let Some(column) = mapping.column_for(*field_id) {
                columns.insert(column, value.clone());
                continue;
            }

            if !search_outside {
                continue;
            }

            let field = model.field(*field_id);
            let Some(rel) = field.ty.as_one_to_one() else {
                continue;
            };

            if value.is_null() {
                bail!(
                    "model {}: cannot filter by an absent `{}`",
                    model.name,
                    field.name
                );
            }

            let Some(key) = lookup(rel.pair, value)? else {
                return Ok(None);
            };
            let pk = mapping.single_primary_key_column(model)?;
            columns.insert(pk, key);
        }

        Ok(Some(columns))
    }
}
