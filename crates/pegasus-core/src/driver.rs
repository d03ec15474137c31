mod transaction;
pub use transaction::{Savepoints, Transaction, TransactionId};

use crate::{
    schema::db::{ColumnId, Table},
    stmt::{Expr, Value},
    Result,
};

use indexmap::IndexMap;
use std::fmt::Debug;

/// Column values of a single row, keyed by column.
pub type ColumnValues = IndexMap<ColumnId, Value>;

/// A row returned by a driver, holding every column of its table in
/// table order.
pub type Row = ColumnValues;

/// The narrow interface a storage engine implements.
///
/// Every call receives tables and columns already resolved from the
/// models; engines never see model-level names. Drivers are used from a
/// single thread and perform their I/O synchronously.
pub trait Driver: Debug + 'static {
    /// Opens the underlying storage. Configuration is owned by the driver
    /// value itself.
    fn init(&mut self) -> Result<()>;

    /// Releases the connection. Other calls fail afterwards.
    fn close(&mut self) -> Result<()>;

    /// Closes the storage and removes what it persisted.
    fn destroy(&mut self) -> Result<()>;

    /// Creates the bookkeeping table recording every table's schema.
    fn create_migration_table(&mut self) -> Result<()>;

    /// Creates `table` if needed and records its schema.
    fn create_table_for(&mut self, table: &Table) -> Result<()>;

    /// Returns the schema recorded for a table of the same name, `None`
    /// if the table was never created.
    fn get_saved_schema_for(&mut self, table: &Table) -> Result<Option<Table>>;

    /// Returns the single row matching all `filters`.
    ///
    /// No match and several matches both return `None`; callers needing
    /// to tell them apart use [`Driver::select_rows`].
    fn get_row(&mut self, table: &Table, filters: &ColumnValues) -> Result<Option<Row>>;

    /// Returns the rows matching `query` and all `filters`.
    ///
    /// `query` only references columns of `table`.
    fn select_rows(
        &mut self,
        table: &Table,
        query: Option<&Expr>,
        filters: &ColumnValues,
    ) -> Result<Vec<Row>>;

    /// Inserts a row and returns it complete, storage-assigned values
    /// included.
    fn insert_row(&mut self, table: &Table, values: &ColumnValues) -> Result<Row>;

    /// Sets one column of the row identified by `key`.
    fn update_row(
        &mut self,
        table: &Table,
        key: &ColumnValues,
        column: ColumnId,
        value: &Value,
    ) -> Result<()>;

    /// Deletes the row identified by `key`.
    fn delete_row(&mut self, table: &Table, key: &ColumnValues) -> Result<()>;

    /// Begins `txn`: an outer transaction, or a savepoint when it has a
    /// parent.
    fn begin_transaction(&mut self, txn: &Transaction) -> Result<()>;

    fn commit_transaction(&mut self, txn: &Transaction) -> Result<()>;

    fn rollback_transaction(&mut self, txn: &Transaction) -> Result<()>;
}
