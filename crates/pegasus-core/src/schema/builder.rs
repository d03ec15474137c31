use super::{app, db, mapping, Mapping, Schema};
use crate::{Error, Result};

use db::{Column, ColumnId, Table, TableId};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Builder {
    /// If set, prefix all table names with this string
    table_name_prefix: Option<String>,

    models: Vec<app::ModelDef>,
}

/// Used to track state during the build process
struct BuildSchema<'a> {
    builder: &'a Builder,
    app: &'a app::Schema,

    /// Tables as they are built
    tables: Vec<Table>,

    mapping: Mapping,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_name_prefix(&mut self, prefix: &str) -> &mut Self {
        self.table_name_prefix = Some(prefix.to_string());
        self
    }

    pub fn model(&mut self, def: app::ModelDef) -> &mut Self {
        self.models.push(def);
        self
    }

    /// Resolves the registered models and derives their tables.
    pub fn build(&self) -> Result<Schema> {
        let app = app::Schema::from_defs(self.models.iter().cloned())?;

        let mut builder = BuildSchema {
            builder: self,
            app: &app,
            tables: Vec::with_capacity(app.models.len()),
            mapping: Mapping::default(),
        };

        for model in app.models() {
            builder.build_table_for_model(model)?;
        }

        let BuildSchema {
            tables, mapping, ..
        } = builder;

        Ok(Schema {
            app,
            db: Arc::new(db::Schema { tables }),
            mapping,
        })
    }
}

impl BuildSchema<'_> {
    fn table_name(&self, model: &app::Model) -> String {
        let name = model.table_name();

        match &self.builder.table_name_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        }
    }

    fn build_table_for_model(&mut self, model: &app::Model) -> Result<()> {
        let table_id = TableId(self.tables.len());
        let name = self.table_name(model);

        if self.tables.iter().any(|table| table.name == name) {
            return Err(Error::invalid_schema(format!(
                "model {}: the table `{}` is already used",
                model.name, name
            )));
        }

        let mut table = Table::new(table_id, name);
        let mut fields = Vec::with_capacity(model.fields.len());

        for field in &model.fields {
            let column_id = ColumnId {
                table: table_id,
                index: table.columns.len(),
            };

            let mapped = match &field.ty {
                app::FieldTy::Primitive(ty) => {
                    table.columns.push(Column {
                        id: column_id,
                        name: field.name.clone(),
                        ty: db::Type::from_app(*ty),
                        nullable: field.is_nullable(),
                        primary_key: field.primary_key,
                        auto_increment: field.auto,
                        references: None,
                    });

                    if field.primary_key {
                        table.primary_key.push(column_id);
                    }

                    mapping::Field::Column(column_id)
                }
                app::FieldTy::OneToOne(rel) if rel.owns_key => {
                    let target = self.app.model(rel.target);
                    let Some(target_pk) = target.single_primary_key() else {
                        return Err(Error::invalid_schema(format!(
                            "model {}: relations need a single-field primary key",
                            target.name
                        )));
                    };

                    table.columns.push(Column {
                        id: column_id,
                        name: format!("{}_{}", target.table_name(), target_pk.name),
                        ty: db::Type::from_app(rel.key_ty),
                        nullable: field.is_nullable(),
                        primary_key: false,
                        auto_increment: false,
                        references: Some(ColumnId {
                            table: TableId(rel.target.0),
                            index: column_index(target, target_pk.id),
                        }),
                    });

                    mapping::Field::ForeignKey {
                        column: column_id,
                        target: rel.target,
                        target_field: target_pk.id,
                    }
                }
                app::FieldTy::OneToOne(rel) => mapping::Field::Pair { pair: rel.pair },
                app::FieldTy::Model(_) => {
                    return Err(Error::invalid_schema(format!(
                        "model {}: field `{}` was not resolved",
                        model.name, field.name
                    )))
                }
            };

            fields.push(mapped);
        }

        self.tables.push(table);
        self.mapping.models.push(mapping::Model {
            id: model.id,
            table: table_id,
            fields,
        });

        Ok(())
    }
}

/// Position of the column storing `field`, counting only fields stored in
/// the model's own table.
fn column_index(model: &app::Model, field: app::FieldId) -> usize {
    model.fields[..field.index]
        .iter()
        .filter(|field| match &field.ty {
            app::FieldTy::Primitive(_) => true,
            app::FieldTy::OneToOne(rel) => rel.owns_key,
            app::FieldTy::Model(_) => false,
        })
        .count()
}
