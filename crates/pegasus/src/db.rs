mod builder;
pub use builder::Builder;

use crate::{
    identity_map::{IdentityMap, Key},
    transaction::Transactions,
    Instance, Query, Result,
};

use pegasus_core::{
    bail,
    driver::{ColumnValues, Driver, Row},
    err,
    schema::{
        app::{self, Bound, FieldId, ModelId, Operation},
        db::ColumnId,
    },
    stmt::{Expr, Value},
    Error, Schema,
};
use std::{
    cell::{Cell, RefCell},
    fmt,
    sync::Arc,
};
use tracing::debug;

/// A database bound to a set of models and one storage driver.
///
/// `Db` is single-threaded: it and the instances it returns are neither
/// `Send` nor `Sync`.
pub struct Db {
    pub(crate) schema: Arc<Schema>,
    pub(crate) driver: RefCell<Box<dyn Driver>>,
    pub(crate) identity: RefCell<IdentityMap>,
    pub(crate) transactions: RefCell<Transactions>,
    closed: Cell<bool>,
}

impl Db {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn new(schema: Arc<Schema>, driver: Box<dyn Driver>) -> Db {
        Db {
            schema,
            driver: RefCell::new(driver),
            identity: RefCell::new(IdentityMap::new()),
            transactions: RefCell::new(Transactions::default()),
            closed: Cell::new(false),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Creates an instance of `model` and persists it.
    ///
    /// Fields not supplied take their default value. Supplying a
    /// storage-assigned field, or omitting a required one, fails before
    /// anything is written. When relations are supplied, the counterparts
    /// are updated in the same transaction as the insert.
    pub fn create<I, K, V>(&self, model: &str, args: I) -> Result<Instance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.ensure_open()?;
        let model = self.model_by_name(model)?;
        let bound = model.bind(
            args.into_iter().map(|(k, v)| (k, v.into())),
            Operation::Creation,
        )?;

        // Resolve counterparts first so a dangling reference writes nothing
        let mut links = vec![];
        for (&field_id, value) in &bound.values {
            let Some(rel) = model.field(field_id).ty.as_one_to_one() else {
                continue;
            };

            if value.is_null() {
                continue;
            }

            links.push((field_id, self.counterpart(rel.target, value)?));
        }

        if links.is_empty() {
            return self.insert_instance(model, &bound, links);
        }

        // Counterparts are written too; all of it lands or none of it
        self.transaction(|db| db.insert_instance(model, &bound, links))
    }

    fn insert_instance(
        &self,
        model: &app::Model,
        bound: &Bound,
        links: Vec<(FieldId, Instance)>,
    ) -> Result<Instance> {
        // The foreign key column is unique: the old owner lets go first
        for (field_id, counterpart) in &links {
            let field = model.field(*field_id);
            if field.ty.as_one_to_one().is_some_and(|rel| rel.owns_key) {
                self.release_target(field, counterpart, None)?;
            }
        }

        let columns = self
            .schema
            .prepare_columns(model, &bound.values, false, |_, _| Ok(None))?
            .ok_or_else(|| err!("model {}: no row to insert", model.name))?;

        let table = self.schema.table_for(model);
        let row = self.driver.borrow_mut().insert_row(table, &columns)?;

        let mapping = self.schema.mapping_for(model);
        let values = model
            .fields
            .iter()
            .map(|field| match mapping.column_for(field.id) {
                Some(column) => row.get(&column).cloned().unwrap_or_default(),
                None => bound.get(field.id).cloned().unwrap_or_default(),
            })
            .collect();

        let instance = Instance::new(self.schema.clone(), model.id, values);
        let instance = self
            .identity
            .borrow_mut()
            .set(model.id, instance.key(), &instance);
        self.transactions.borrow_mut().created(&instance);

        debug!(model = %model.name, key = ?instance.key(), "create");

        for (field_id, counterpart) in links {
            let field = model.field(field_id);
            let rel = field.ty.as_one_to_one().copied().ok_or_else(|| {
                err!("model {}: `{}` is not a relation", model.name, field.name)
            })?;

            if rel.owns_key {
                // The key is already stored; only the mirror is behind.
                self.update_memory(&counterpart, rel.pair, Value::from(&instance));
            } else {
                self.link(&counterpart, rel.pair, Some(&instance))?;
            }
        }

        Ok(instance)
    }

    /// Returns the instance of `model` matching all `args`.
    ///
    /// Zero and several matches both return `None`.
    pub fn get<I, K, V>(&self, model: &str, args: I) -> Result<Option<Instance>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.ensure_open()?;
        let model = self.model_by_name(model)?;
        let bound = model.bind(
            args.into_iter().map(|(k, v)| (k, v.into())),
            Operation::Portion,
        )?;

        // A lookup by primary key is answered by the identity map
        let by_key = bound.values.len() == model.primary_key.fields.len()
            && model
                .primary_key
                .fields
                .iter()
                .all(|pk| bound.values.contains_key(pk));

        if by_key {
            let key: Key = model
                .primary_key
                .fields
                .iter()
                .filter_map(|pk| bound.get(*pk).cloned())
                .collect();

            if let Some(instance) = self.identity.borrow().get(model.id, &key) {
                debug!(model = %model.name, ?key, "get (identity map)");
                return Ok(Some(instance));
            }
        }

        let Some(filters) = self.prepare_filters(model, &bound.values)? else {
            debug!(model = %model.name, "get (no counterpart)");
            return Ok(None);
        };
        debug!(model = %model.name, ?filters, "get");

        let table = self.schema.table_for(model);
        let row = self.driver.borrow_mut().get_row(table, &filters)?;

        row.map(|row| self.materialize(model.id, row)).transpose()
    }

    /// Writes `value` to the field named `field` of `instance`.
    ///
    /// Relation fields take the counterpart (or `Value::Null`) and keep
    /// both sides of the relation in sync.
    pub fn set(&self, instance: &Instance, field: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_open()?;
        instance.ensure_live()?;

        let model = instance.model();
        let field = model.find_field(field)?;

        if field.auto {
            return Err(Error::set_by_storage(&model.name, &field.name));
        }

        let value = match field.value_ty() {
            Some(ty) => ty.cast(value.into()),
            None => value.into(),
        };

        if field.is_relation() && value.is_null() && !field.is_nullable() {
            return Err(Error::relation_required(&model.name, &field.name));
        }

        if !field.accepts(&value) {
            let to_type = field.value_ty().map(|ty| ty.name()).unwrap_or("Model");
            return Err(Error::type_conversion(value, to_type)
                .context(err!("model {}: field `{}`", model.name, field.name)));
        }

        debug!(model = %model.name, key = ?instance.key(), field = %field.name, ?value, "set");

        match field.ty {
            app::FieldTy::OneToOne(rel) if rel.owns_key => {
                let target = match value.is_null() {
                    true => None,
                    false => Some(self.counterpart(rel.target, &value)?),
                };
                self.link(instance, field.id, target.as_ref())
            }
            app::FieldTy::OneToOne(rel) => {
                let owner = match value.is_null() {
                    true => None,
                    false => Some(self.counterpart(rel.target, &value)?),
                };
                self.relink_owner(instance, field, owner.as_ref())
            }
            _ => self.write_field(instance, field.id, value),
        }
    }

    /// Deletes `instance` from storage.
    ///
    /// Live counterparts lose their reference to it. Deleting the target
    /// of a mandatory relation fails.
    pub fn delete(&self, instance: &Instance) -> Result<()> {
        self.ensure_open()?;
        instance.ensure_live()?;

        let model = instance.model();

        // Check every relation before writing anything
        let mut owners = vec![];
        let mut targets = vec![];
        for field in model.relations() {
            let Some(rel) = field.ty.as_one_to_one() else {
                continue;
            };

            let Some(counterpart) = self.related(instance, &field.name)? else {
                continue;
            };

            if rel.owns_key {
                targets.push((counterpart, rel.pair));
            } else {
                let pair = self.schema.app.field(rel.pair);
                if !pair.is_nullable() {
                    return Err(Error::relation_required(
                        &counterpart.model().name,
                        &pair.name,
                    ));
                }
                owners.push((counterpart, rel.pair));
            }
        }

        for (owner, field) in owners {
            self.write_field(&owner, field, Value::Null)?;
        }

        let key = self.key_columns(instance)?;
        self.touch(instance);
        self.driver
            .borrow_mut()
            .delete_row(self.schema.table_for(model), &key)?;

        self.identity.borrow_mut().delete(model.id, &instance.key());
        instance.mark_deleted();

        for (target, field) in targets {
            self.update_memory(&target, field, Value::Null);
        }

        debug!(model = %model.name, key = ?instance.key(), "delete");
        Ok(())
    }

    /// Builds a lazy query over the instances of `model` matching `expr`.
    ///
    /// Nothing is read until the query is first iterated.
    pub fn select(&self, model: &str, expr: impl Into<Option<Expr>>) -> Result<Query<'_>> {
        let model = self.model_by_name(model)?;
        Ok(Query::new(self, model.id, expr.into()))
    }

    /// Returns the counterpart referenced by the relation `field`.
    pub fn related(&self, instance: &Instance, field: &str) -> Result<Option<Instance>> {
        let model = instance.model();
        let field = model.find_field(field)?;

        let Some(rel) = field.ty.as_one_to_one() else {
            bail!("model {}: `{}` is not a relation", model.name, field.name);
        };

        let key = instance.value(field.id);
        if key.is_null() {
            return Ok(None);
        }

        self.get_by_key(rel.target, &key)
    }

    /// Closes the storage. Every later operation fails.
    pub fn close(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Ok(());
        }

        debug!("close");
        self.identity.borrow_mut().prune();
        self.driver.borrow_mut().close()
    }

    /// Closes the storage and removes everything it persisted.
    pub fn destroy(self) -> Result<()> {
        debug!("destroy");
        self.closed.set(true);
        self.driver.borrow_mut().destroy()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            bail!("the database is closed");
        }
        Ok(())
    }

    pub(crate) fn model_by_name(&self, name: &str) -> Result<&app::Model> {
        match self.schema.app.model_by_name(name) {
            Some(model) => Ok(model),
            None => bail!("no model named {name} is registered"),
        }
    }

    /// Loads the instance of `model` with the single-field primary key
    /// `key`.
    pub(crate) fn get_by_key(&self, model: ModelId, key: &Value) -> Result<Option<Instance>> {
        if let Some(instance) = self.identity.borrow().get(model, std::slice::from_ref(key)) {
            return Ok(Some(instance));
        }

        let app_model = self.schema.model(model);
        let pk = self.pk_column(model)?;
        let filters = ColumnValues::from([(pk, key.clone())]);

        let row = self
            .driver
            .borrow_mut()
            .get_row(self.schema.table_for(app_model), &filters)?;

        row.map(|row| self.materialize(model, row)).transpose()
    }

    /// Like [`get_by_key`](Self::get_by_key), for a key that must exist.
    pub(crate) fn counterpart(&self, model: ModelId, key: &Value) -> Result<Instance> {
        self.get_by_key(model, key)?.ok_or_else(|| {
            Error::record_not_found(format!(
                "model {} with key {:?}",
                self.schema.model(model).name,
                key
            ))
        })
    }

    /// Turns a row into an instance, preferring the live instance with
    /// the same key.
    pub(crate) fn materialize(&self, model: ModelId, row: Row) -> Result<Instance> {
        let app_model = self.schema.model(model);
        let mapping = self.schema.mapping_for(model);

        let key: Key = mapping
            .primary_key_columns(app_model)
            .map(|column| row.get(&column).cloned().unwrap_or_default())
            .collect();

        if let Some(instance) = self.identity.borrow().get(model, &key) {
            return Ok(instance);
        }

        let mut values = Vec::with_capacity(app_model.fields.len());
        for field in &app_model.fields {
            let value = match mapping.column_for(field.id) {
                Some(column) => row.get(&column).cloned().unwrap_or_default(),
                None => self.load_pair_key(field, &key)?,
            };
            values.push(value);
        }

        let instance = Instance::new(self.schema.clone(), model, values);
        Ok(self.identity.borrow_mut().set(model, key, &instance))
    }

    /// The value of a non-owning relation field: the key of the row
    /// pointing at `key`, if exactly one does.
    fn load_pair_key(&self, field: &app::Field, key: &[Value]) -> Result<Value> {
        let Some(rel) = field.ty.as_one_to_one() else {
            return Ok(Value::Null);
        };

        let [key] = key else {
            return Ok(Value::Null);
        };

        let owner_model = self.schema.model(rel.target);
        let owner_mapping = self.schema.mapping_for(rel.target);
        let Some(fk) = owner_mapping.column_for(rel.pair) else {
            return Ok(Value::Null);
        };

        let filters = ColumnValues::from([(fk, key.clone())]);
        let row = self
            .driver
            .borrow_mut()
            .get_row(self.schema.table_for(owner_model), &filters)?;

        let pk = self.pk_column(rel.target)?;
        Ok(row
            .and_then(|row| row.get(&pk).cloned())
            .unwrap_or_default())
    }

    /// Column filters for a lookup, resolving non-owning relation fields
    /// through the foreign key held by the counterpart.
    ///
    /// `None` when such a counterpart does not exist or points elsewhere:
    /// nothing can match.
    pub(crate) fn prepare_filters(
        &self,
        model: &app::Model,
        values: &indexmap::IndexMap<FieldId, Value>,
    ) -> Result<Option<ColumnValues>> {
        self.schema
            .prepare_columns(model, values, true, |pair, counterpart_key| {
                let Some(owner) = self.get_by_key(pair.model, counterpart_key)? else {
                    return Ok(None);
                };

                let key = owner.value(pair);
                Ok((!key.is_null()).then_some(key))
            })
    }

    pub(crate) fn pk_column(&self, model: ModelId) -> Result<ColumnId> {
        let app_model = self.schema.model(model);
        let mut columns = self.schema.mapping_for(model).primary_key_columns(app_model);

        match (columns.next(), columns.next()) {
            (Some(column), None) => Ok(column),
            _ => bail!("model {}: expected a single-field primary key", app_model.name),
        }
    }

    pub(crate) fn key_columns(&self, instance: &Instance) -> Result<ColumnValues> {
        let model = instance.model();
        let mapping = self.schema.mapping_for(model);

        model
            .primary_key
            .fields
            .iter()
            .map(|pk| {
                let column = mapping.column_for(*pk).ok_or_else(|| {
                    err!("model {}: primary key is not stored", model.name)
                })?;
                Ok((column, instance.value(*pk)))
            })
            .collect()
    }

    /// Writes a field stored in the instance's table, in storage and in
    /// memory.
    pub(crate) fn write_field(&self, instance: &Instance, field: FieldId, value: Value) -> Result<()> {
        let model = instance.model();
        let Some(column) = self.schema.mapping_for(model).column_for(field) else {
            bail!(
                "model {}: `{}` is not stored in its table",
                model.name,
                model.field(field).name
            );
        };

        let key = self.key_columns(instance)?;
        self.touch(instance);
        self.driver.borrow_mut().update_row(
            self.schema.table_for(model),
            &key,
            column,
            &value,
        )?;

        let old_key = instance.key();
        instance.set_value(field, value);

        if model.field(field).primary_key {
            let mut identity = self.identity.borrow_mut();
            identity.evict(model.id, &old_key, instance);
            identity.set(model.id, instance.key(), instance);
        }

        Ok(())
    }

    /// Changes a field in memory only, as when a counterpart's write
    /// already reached storage.
    pub(crate) fn update_memory(&self, instance: &Instance, field: FieldId, value: Value) {
        if instance.value(field) == value {
            return;
        }

        self.touch(instance);
        instance.set_value(field, value);
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Db")
            .field("driver", &self.driver)
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if !self.closed.get() {
            if let Err(err) = self.driver.get_mut().close() {
                tracing::warn!(error = %err, "closing the driver failed");
            }
        }
    }
}
