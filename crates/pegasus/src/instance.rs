use crate::identity_map::Key;

use pegasus_core::{
    schema::app::{self, FieldId, ModelId},
    stmt::Value,
    Error, Result, Schema,
};
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    sync::Arc,
};

/// A live model instance.
///
/// Handles are cheap to clone and all clones share the same state; two
/// handles are equal only if they are the same instance. Reads go through
/// the handle, writes through [`Db`](crate::Db) so that storage, the
/// identity map and transactions stay consistent.
#[derive(Clone)]
pub struct Instance {
    state: Rc<InstanceState>,
}

pub(crate) struct InstanceState {
    schema: Arc<Schema>,
    model: ModelId,

    /// Field values in field order. Relation fields hold the primary key
    /// of the counterpart.
    values: RefCell<Vec<Value>>,
    deleted: Cell<bool>,
}

impl Instance {
    pub(crate) fn new(schema: Arc<Schema>, model: ModelId, values: Vec<Value>) -> Instance {
        debug_assert_eq!(schema.model(model).fields.len(), values.len());

        Instance {
            state: Rc::new(InstanceState {
                schema,
                model,
                values: RefCell::new(values),
                deleted: Cell::new(false),
            }),
        }
    }

    pub(crate) fn from_state(state: Rc<InstanceState>) -> Instance {
        Instance { state }
    }

    pub(crate) fn state(&self) -> &Rc<InstanceState> {
        &self.state
    }

    pub fn model_id(&self) -> ModelId {
        self.state.model
    }

    pub fn model(&self) -> &app::Model {
        self.state.schema.model(self.state.model)
    }

    /// Returns the value of the field named `field`.
    pub fn get(&self, field: &str) -> Result<Value> {
        let field = self.model().find_field(field)?;
        Ok(self.value(field.id))
    }

    /// Returns the value of the field named `field`, converted.
    ///
    /// ```ignore
    /// let price: i64 = ford.get_as("price")?;
    /// let notes: Option<String> = ford.get_as("notes")?;
    /// ```
    pub fn get_as<T>(&self, field: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        T::try_from(self.get(field)?)
    }

    /// Returns all field values by name, in declaration order.
    pub fn values(&self) -> Vec<(String, Value)> {
        let values = self.state.values.borrow();
        self.model()
            .fields
            .iter()
            .map(|field| (field.name.clone(), values[field.id.index].clone()))
            .collect()
    }

    /// Primary key values, in primary key order.
    pub fn key(&self) -> Key {
        let values = self.state.values.borrow();
        self.model()
            .primary_key
            .fields
            .iter()
            .map(|field| values[field.index].clone())
            .collect()
    }

    /// True once the instance was deleted from storage.
    pub fn is_deleted(&self) -> bool {
        self.state.deleted.get()
    }

    pub(crate) fn value(&self, field: FieldId) -> Value {
        debug_assert_eq!(field.model, self.state.model);
        self.state.values.borrow()[field.index].clone()
    }

    pub(crate) fn set_value(&self, field: FieldId, value: Value) {
        debug_assert_eq!(field.model, self.state.model);
        self.state.values.borrow_mut()[field.index] = value;
    }

    pub(crate) fn snapshot(&self) -> Vec<Value> {
        self.state.values.borrow().clone()
    }

    pub(crate) fn restore(&self, values: Vec<Value>, deleted: bool) {
        *self.state.values.borrow_mut() = values;
        self.state.deleted.set(deleted);
    }

    pub(crate) fn mark_deleted(&self) {
        self.state.deleted.set(true);
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::instance_deleted(&self.model().name));
        }
        Ok(())
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Instance {}

/// The primary key of the instance, for models keyed by a single field.
///
/// This is the value relation fields hold, so an instance can be passed
/// wherever a counterpart is expected.
impl From<&Instance> for Value {
    fn from(instance: &Instance) -> Value {
        instance.key().into_iter().next().unwrap_or_default()
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Value {
        Value::from(&instance)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.state, fmt)
    }
}

impl fmt::Debug for InstanceState {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.schema.model(self.model);
        let values = self.values.borrow();

        let mut s = fmt.debug_struct(&model.name);
        for field in &model.fields {
            s.field(&field.name, &values[field.id.index]);
        }
        if self.deleted.get() {
            s.field("deleted", &true);
        }
        s.finish()
    }
}
