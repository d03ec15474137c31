#[macro_use]
mod macros;

pub mod driver;
pub use driver::Driver;

mod error;
pub use error::{Error, IntoError, InvalidArgumentReason};

pub mod schema;
pub use schema::Schema;

pub mod stmt;

/// A Result type alias that uses Pegasus' [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
