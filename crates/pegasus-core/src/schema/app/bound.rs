use super::{FieldId, Model, ModelId};
use crate::{stmt::Value, Error, Result};

use indexmap::IndexMap;

/// A subset of a model's fields with concrete values.
///
/// Used both for creation payloads and for partial lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub model: ModelId,
    pub values: IndexMap<FieldId, Value>,
}

/// What the arguments of [`Model::bind`] are used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A full payload: defaults are applied, storage-assigned fields are
    /// forbidden and required fields must be present.
    Creation,

    /// Only the supplied fields, as for a lookup.
    Portion,
}

impl Model {
    /// Matches named arguments against the model's fields.
    pub fn bind<I, K>(&self, args: I, operation: Operation) -> Result<Bound>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut supplied = IndexMap::new();

        for (name, value) in args {
            let field = self.find_field(name.as_ref())?;

            if operation == Operation::Creation && field.auto {
                return Err(Error::forbidden_argument(&self.name, &field.name));
            }

            let value = match field.value_ty() {
                Some(ty) => ty.cast(value),
                None => value,
            };

            if !field.accepts(&value) {
                let to_type = field.value_ty().map(|ty| ty.name()).unwrap_or("Model");
                return Err(Error::type_conversion(value, to_type)
                    .context(err!("model {}: field `{}`", self.name, field.name)));
            }

            supplied.insert(field.id, value);
        }

        let values = match operation {
            Operation::Portion => {
                supplied.sort_keys();
                supplied
            }
            Operation::Creation => {
                let mut values = IndexMap::with_capacity(self.fields.len());

                for field in &self.fields {
                    if let Some(value) = supplied.swap_remove(&field.id) {
                        values.insert(field.id, value);
                    } else if field.auto {
                        continue;
                    } else if let Some(default) = &field.default {
                        values.insert(field.id, default.clone());
                    } else if field.is_nullable() {
                        values.insert(field.id, Value::Null);
                    } else {
                        return Err(Error::missing_argument(&self.name, &field.name));
                    }
                }

                values
            }
        };

        Ok(Bound {
            model: self.id,
            values,
        })
    }
}

impl Bound {
    pub fn get(&self, field: FieldId) -> Option<&Value> {
        self.values.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
