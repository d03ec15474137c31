use super::{Field, FieldDefTy, FieldId, FieldTy, Model, ModelDef, ModelId, OneToOne, PrimaryKey};
use crate::{stmt::Type, Error, Result};

#[derive(Debug, Default)]
pub struct Schema {
    pub models: Vec<Model>,
}

impl Schema {
    /// Builds the schema of the given definitions and resolves the
    /// relations between them.
    pub fn from_defs(defs: impl IntoIterator<Item = ModelDef>) -> Result<Schema> {
        let defs: Vec<_> = defs.into_iter().collect();
        let mut models = Vec::with_capacity(defs.len());

        for (index, def) in defs.iter().enumerate() {
            if defs[..index].iter().any(|other| other.name == def.name) {
                return Err(Error::invalid_schema(format!(
                    "model {} is defined twice",
                    def.name
                )));
            }

            models.push(Schema::model_from_def(ModelId(index), def, &defs)?);
        }

        let mut schema = Schema { models };
        schema.resolve_relations()?;
        Ok(schema)
    }

    fn model_from_def(id: ModelId, def: &ModelDef, defs: &[ModelDef]) -> Result<Model> {
        let primary: Vec<_> = def.fields.iter().filter(|f| f.primary_key).collect();

        if primary.len() > 1 {
            return Err(Error::invalid_schema(format!(
                "model {}: several fields are marked as primary key ({})",
                def.name,
                primary
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut fields = vec![];

        if primary.is_empty() {
            if def.fields.iter().any(|f| f.name == "id") {
                return Err(Error::invalid_schema(format!(
                    "model {}: a field is named `id` but is not the primary key",
                    def.name
                )));
            }

            fields.push(Field {
                id: FieldId { model: id, index: 0 },
                name: "id".to_string(),
                ty: FieldTy::Primitive(Type::I64),
                nullable: false,
                primary_key: true,
                default: None,
                auto: true,
                owns_key_hint: None,
            });
        }

        for field_def in &def.fields {
            let ty = match &field_def.ty {
                FieldDefTy::Primitive(ty) => FieldTy::Primitive(*ty),
                FieldDefTy::Model(name) => {
                    let Some(target) = defs.iter().position(|d| d.name == *name) else {
                        return Err(Error::invalid_schema(format!(
                            "model {}: field `{}` references the unknown model {}",
                            def.name, field_def.name, name
                        )));
                    };
                    FieldTy::Model(ModelId(target))
                }
            };

            if field_def.primary_key && !ty.is_primitive() {
                return Err(Error::invalid_schema(format!(
                    "model {}: the relation `{}` cannot be the primary key",
                    def.name, field_def.name
                )));
            }

            if fields.iter().any(|f: &Field| f.name == field_def.name) {
                return Err(Error::invalid_schema(format!(
                    "model {}: the field `{}` is defined twice",
                    def.name, field_def.name
                )));
            }

            fields.push(Field {
                id: FieldId {
                    model: id,
                    index: fields.len(),
                },
                name: field_def.name.clone(),
                ty,
                nullable: field_def.nullable,
                primary_key: field_def.primary_key,
                default: field_def.default.clone(),
                auto: field_def.auto,
                owns_key_hint: field_def.owns_key,
            });
        }

        let primary_key = PrimaryKey {
            fields: fields
                .iter()
                .filter(|f| f.primary_key)
                .map(|f| f.id)
                .collect(),
        };

        Ok(Model {
            id,
            name: def.name.clone(),
            fields,
            primary_key,
            table_name: def.table_name.clone(),
        })
    }

    pub fn model(&self, id: impl Into<ModelId>) -> &Model {
        &self.models[id.into().0]
    }

    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn models(&self) -> impl ExactSizeIterator<Item = &Model> {
        self.models.iter()
    }

    pub fn field(&self, id: FieldId) -> &Field {
        self.model(id.model).field(id)
    }

    /// Pairs every model reference with the field pointing back at it.
    ///
    /// Fields already paired are left alone, so resolving twice is a
    /// no-op.
    pub fn resolve_relations(&mut self) -> Result<()> {
        let pending: Vec<FieldId> = self
            .models
            .iter()
            .flat_map(|model| model.fields.iter())
            .filter(|field| matches!(field.ty, FieldTy::Model(_)))
            .map(|field| field.id)
            .collect();

        for field_id in pending {
            // Resolved as the pair of an earlier field
            let FieldTy::Model(target) = self.field(field_id).ty else {
                continue;
            };

            let pair_id = self.find_pair(field_id, target)?;
            let owns_key = self.decide_owner(field_id, pair_id)?;

            let key_ty = self.relation_key_ty(target)?;
            let pair_key_ty = self.relation_key_ty(field_id.model)?;

            self.field_mut(field_id).ty = FieldTy::OneToOne(OneToOne {
                target,
                pair: pair_id,
                owns_key,
                key_ty,
            });

            self.field_mut(pair_id).ty = FieldTy::OneToOne(OneToOne {
                target: field_id.model,
                pair: field_id,
                owns_key: !owns_key,
                key_ty: pair_key_ty,
            });
        }

        Ok(())
    }

    fn find_pair(&self, field_id: FieldId, target: ModelId) -> Result<FieldId> {
        let field = self.field(field_id);
        let mut candidates = self
            .model(target)
            .fields
            .iter()
            .filter(|candidate| candidate.id != field_id)
            .filter(|candidate| matches!(candidate.ty, FieldTy::Model(m) if m == field_id.model));

        let Some(pair) = candidates.next() else {
            return Err(Error::invalid_schema(format!(
                "model {}: field `{}` has no opposed field in model {}",
                self.model(field_id.model).name,
                field.name,
                self.model(target).name
            )));
        };

        if let Some(other) = candidates.next() {
            tracing::debug!(
                model = %self.model(field_id.model).name,
                field = %field.name,
                chosen = %pair.name,
                ignored = %other.name,
                "several opposed fields, using the first one"
            );
        }

        Ok(pair.id)
    }

    /// Returns `true` if `field_id`, rather than its pair, holds the key.
    fn decide_owner(&self, field_id: FieldId, pair_id: FieldId) -> Result<bool> {
        let field = self.field(field_id);
        let pair = self.field(pair_id);

        let describe = || {
            format!(
                "{}.{} <-> {}.{}",
                self.model(field_id.model).name,
                field.name,
                self.model(pair_id.model).name,
                pair.name
            )
        };

        match (field.owns_key_hint, pair.owns_key_hint) {
            (Some(a), Some(b)) if a == b => Err(Error::invalid_schema(format!(
                "relation {}: both sides declare the same key ownership",
                describe()
            ))),
            (Some(a), _) => Ok(a),
            (None, Some(b)) => Ok(!b),
            (None, None) => {
                let field_optional = field.default.is_some() || field.nullable;
                let pair_optional = pair.default.is_some() || pair.nullable;

                if field_optional == pair_optional {
                    return Err(Error::invalid_schema(format!(
                        "relation {}: cannot tell which side holds the key, \
                         declare it with `owns_key`",
                        describe()
                    )));
                }

                Ok(!field_optional)
            }
        }
    }

    fn relation_key_ty(&self, target: ModelId) -> Result<Type> {
        let model = self.model(target);

        model
            .single_primary_key()
            .and_then(|pk| pk.value_ty())
            .ok_or_else(|| {
                Error::invalid_schema(format!(
                    "model {}: relations need a single-field primary key",
                    model.name
                ))
            })
    }

    fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.models[id.model.0].fields[id.index]
    }
}
