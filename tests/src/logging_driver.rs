use pegasus::driver::{ColumnValues, Driver, Row, Transaction};
use pegasus_core::{
    schema::db::{ColumnId, Table},
    stmt::{Expr, Value},
    Result,
};
use std::sync::{Arc, Mutex};

/// A driver wrapper recording every call it forwards.
#[derive(Debug)]
pub struct LoggingDriver {
    inner: Box<dyn Driver>,

    /// Log of all operations executed through this driver
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

/// One driver call, with table names in place of tables.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOp {
    Init,
    Close,
    Destroy,
    CreateMigrationTable,
    CreateTable(String),
    GetSavedSchema(String),
    GetRow {
        table: String,
        filters: ColumnValues,
    },
    SelectRows {
        table: String,
        query: Option<Expr>,
        filters: ColumnValues,
    },
    InsertRow {
        table: String,
        values: ColumnValues,
    },
    UpdateRow {
        table: String,
        column: ColumnId,
        value: Value,
    },
    DeleteRow(String),
    Begin(Transaction),
    Commit(Transaction),
    Rollback(Transaction),
}

impl LoggingDriver {
    pub fn new(driver: impl Driver) -> Self {
        Self {
            inner: Box::new(driver),
            ops_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get a handle to access the operations log
    pub fn ops_log_handle(&self) -> Arc<Mutex<Vec<DriverOp>>> {
        self.ops_log.clone()
    }

    fn log(&self, op: DriverOp) {
        self.ops_log
            .lock()
            .expect("Failed to acquire ops log lock")
            .push(op);
    }
}

impl Driver for LoggingDriver {
    fn init(&mut self) -> Result<()> {
        self.log(DriverOp::Init);
        self.inner.init()
    }

    fn close(&mut self) -> Result<()> {
        self.log(DriverOp::Close);
        self.inner.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.log(DriverOp::Destroy);
        self.inner.destroy()
    }

    fn create_migration_table(&mut self) -> Result<()> {
        self.log(DriverOp::CreateMigrationTable);
        self.inner.create_migration_table()
    }

    fn create_table_for(&mut self, table: &Table) -> Result<()> {
        self.log(DriverOp::CreateTable(table.name.clone()));
        self.inner.create_table_for(table)
    }

    fn get_saved_schema_for(&mut self, table: &Table) -> Result<Option<Table>> {
        self.log(DriverOp::GetSavedSchema(table.name.clone()));
        self.inner.get_saved_schema_for(table)
    }

    fn get_row(&mut self, table: &Table, filters: &ColumnValues) -> Result<Option<Row>> {
        self.log(DriverOp::GetRow {
            table: table.name.clone(),
            filters: filters.clone(),
        });
        self.inner.get_row(table, filters)
    }

    fn select_rows(
        &mut self,
        table: &Table,
        query: Option<&Expr>,
        filters: &ColumnValues,
    ) -> Result<Vec<Row>> {
        self.log(DriverOp::SelectRows {
            table: table.name.clone(),
            query: query.cloned(),
            filters: filters.clone(),
        });
        self.inner.select_rows(table, query, filters)
    }

    fn insert_row(&mut self, table: &Table, values: &ColumnValues) -> Result<Row> {
        self.log(DriverOp::InsertRow {
            table: table.name.clone(),
            values: values.clone(),
        });
        self.inner.insert_row(table, values)
    }

    fn update_row(
        &mut self,
        table: &Table,
        key: &ColumnValues,
        column: ColumnId,
        value: &Value,
    ) -> Result<()> {
        self.log(DriverOp::UpdateRow {
            table: table.name.clone(),
            column,
            value: value.clone(),
        });
        self.inner.update_row(table, key, column, value)
    }

    fn delete_row(&mut self, table: &Table, key: &ColumnValues) -> Result<()> {
        self.log(DriverOp::DeleteRow(table.name.clone()));
        self.inner.delete_row(table, key)
    }

    fn begin_transaction(&mut self, txn: &Transaction) -> Result<()> {
        self.log(DriverOp::Begin(*txn));
        self.inner.begin_transaction(txn)
    }

    fn commit_transaction(&mut self, txn: &Transaction) -> Result<()> {
        self.log(DriverOp::Commit(*txn));
        self.inner.commit_transaction(txn)
    }

    fn rollback_transaction(&mut self, txn: &Transaction) -> Result<()> {
        self.log(DriverOp::Rollback(*txn));
        self.inner.rollback_transaction(txn)
    }
}
