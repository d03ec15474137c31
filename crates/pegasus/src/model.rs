use crate::{Db, Instance, Query, Result};

use pegasus_core::{
    schema::app::ModelDef,
    stmt::{Expr, Value},
};

/// A typed view over the instances of one model.
///
/// Implementors wrap an [`Instance`] and describe their fields once in
/// [`define`](Model::define); registration goes through
/// [`Builder::register`](crate::db::Builder::register).
///
/// ```ignore
/// struct Car(Instance);
///
/// impl Model for Car {
///     const NAME: &'static str = "Car";
///
///     fn define() -> ModelDef {
///         ModelDef::new("Car")
///             .field(FieldDef::new("name", Type::String))
///             .field(FieldDef::new("price", Type::I64))
///     }
///
///     fn from_instance(instance: Instance) -> Result<Self> {
///         Ok(Car(instance))
///     }
///
///     fn as_instance(&self) -> &Instance {
///         &self.0
///     }
/// }
/// ```
pub trait Model: Sized {
    /// Name the model is registered under.
    const NAME: &'static str;

    fn define() -> ModelDef;

    fn from_instance(instance: Instance) -> Result<Self>;

    fn as_instance(&self) -> &Instance;

    fn create<I, K, V>(db: &Db, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Self::from_instance(db.create(Self::NAME, args)?)
    }

    fn get<I, K, V>(db: &Db, args: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        db.get(Self::NAME, args)?
            .map(Self::from_instance)
            .transpose()
    }

    /// Lazy query over this model; see [`Db::select`].
    fn select(db: &Db, expr: impl Into<Option<Expr>>) -> Result<Query<'_>> {
        db.select(Self::NAME, expr)
    }

    /// Runs a query and wraps every instance.
    fn all(db: &Db, expr: impl Into<Option<Expr>>) -> Result<Vec<Self>> {
        Self::select(db, expr)?
            .to_vec()?
            .into_iter()
            .map(Self::from_instance)
            .collect()
    }

    fn set(&self, db: &Db, field: &str, value: impl Into<Value>) -> Result<()> {
        db.set(self.as_instance(), field, value)
    }

    fn delete(&self, db: &Db) -> Result<()> {
        db.delete(self.as_instance())
    }
}
