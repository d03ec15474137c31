pub mod db;
pub use db::Db;

mod identity_map;

mod instance;
pub use instance::Instance;

mod model;
pub use model::Model;

mod query;
pub use query::Query;

mod relation;

mod transaction;
pub use transaction::Transaction;

pub use pegasus_core::{Error, Result};

pub mod schema {
    pub use pegasus_core::schema::app::{FieldDef, ModelDef};
    pub use pegasus_core::schema::*;
}

pub mod stmt {
    pub use pegasus_core::stmt::{field, BinaryOp, Expr, Type, Value};
}

pub mod driver {
    pub use pegasus_core::driver::*;

    #[cfg(feature = "sqlite")]
    pub use pegasus_driver_sqlite::Sqlite;
}
