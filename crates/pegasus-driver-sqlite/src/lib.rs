mod serializer;
use serializer::{Serializer, Statement, LOWER_FUNCTION, MIGRATION_TABLE};

mod value;
pub(crate) use value::Value;

use pegasus_core::{
    driver::{ColumnValues, Driver, Row, Savepoints, Transaction},
    err,
    schema::db::{ColumnId, Table},
    stmt, Error, Result,
};
use rusqlite::{functions::FunctionFlags, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use url::Url;

/// SQLite storage, in memory or in a file.
#[derive(Debug)]
pub struct Sqlite {
    target: Target,

    /// Open between `init` and `close`
    connection: Option<Connection>,

    savepoints: Savepoints,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a new SQLite driver from a `sqlite:` URL.
    ///
    /// `sqlite::memory:` selects an in-memory database; any other path is
    /// a file.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(Error::driver_operation_failed)?;

        if url.scheme() != "sqlite" {
            return Err(err!(
                "connection URL does not have a `sqlite` scheme; url={url_str}"
            ));
        }

        if url.path() == ":memory:" {
            Ok(Self::in_memory())
        } else {
            Ok(Self::open(url.path()))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Self {
        Self::with_target(Target::InMemory)
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::with_target(Target::File(path.as_ref().to_path_buf()))
    }

    fn with_target(target: Target) -> Self {
        Sqlite {
            target,
            connection: None,
            savepoints: Savepoints::new(),
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| err!("the sqlite connection is not open"))
    }

    fn execute(&self, stmt: &Statement) -> Result<usize> {
        trace!(sql = %stmt.sql, params = ?stmt.params, "execute");

        let connection = self.connection()?;
        let mut prepared = connection
            .prepare_cached(&stmt.sql)
            .map_err(Error::driver_operation_failed)?;

        prepared
            .execute(rusqlite::params_from_iter(params(stmt)))
            .map_err(Error::driver_operation_failed)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        trace!(%sql, "execute");

        self.connection()?
            .execute_batch(sql)
            .map_err(Error::driver_operation_failed)
    }

    /// Runs a statement returning every column of `table`.
    fn query(&self, table: &Table, stmt: &Statement) -> Result<Vec<Row>> {
        trace!(sql = %stmt.sql, params = ?stmt.params, "query");

        let connection = self.connection()?;
        let mut prepared = connection
            .prepare_cached(&stmt.sql)
            .map_err(Error::driver_operation_failed)?;

        let mut rows = prepared
            .query(rusqlite::params_from_iter(params(stmt)))
            .map_err(Error::driver_operation_failed)?;

        let mut ret = vec![];

        while let Some(row) = rows.next().map_err(Error::driver_operation_failed)? {
            let mut values = ColumnValues::with_capacity(table.columns.len());

            for (index, column) in table.columns.iter().enumerate() {
                values.insert(column.id, Value::from_sql(row, index, column.ty)?.into_inner());
            }

            ret.push(values);
        }

        Ok(ret)
    }
}

fn params(stmt: &Statement) -> impl Iterator<Item = Value> + '_ {
    stmt.params.iter().cloned().map(Value::from)
}

/// Lowercases text with the full Unicode case mapping; SQLite's own
/// `lower()` only folds ASCII.
fn register_functions(connection: &Connection) -> rusqlite::Result<()> {
    connection.create_scalar_function(
        LOWER_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

impl Driver for Sqlite {
    fn init(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let connection = match &self.target {
            Target::File(path) => Connection::open(path),
            Target::InMemory => Connection::open_in_memory(),
        }
        .map_err(Error::driver_operation_failed)?;

        register_functions(&connection).map_err(Error::driver_operation_failed)?;

        debug!(target = ?self.target, "sqlite connection opened");
        self.connection = Some(connection);
        self.savepoints = Savepoints::new();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };

        connection
            .close()
            .map_err(|(_, err)| Error::driver_operation_failed(err))
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;

        if let Target::File(path) = &self.target {
            if path.exists() {
                std::fs::remove_file(path).map_err(Error::driver_operation_failed)?;
            }
        }

        Ok(())
    }

    fn create_migration_table(&mut self) -> Result<()> {
        self.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{MIGRATION_TABLE}\" (\
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"table_name\" TEXT NOT NULL UNIQUE, \
             \"last_updated\" TIMESTAMP NOT NULL, \
             \"schema\" BLOB NOT NULL)"
        ))
    }

    fn create_table_for(&mut self, table: &Table) -> Result<()> {
        self.execute(&Serializer::new(table).create_table())?;

        let schema = serde_json::to_vec(table).map_err(Error::driver_operation_failed)?;
        let now = chrono::Utc::now().naive_utc();

        self.execute(&Statement {
            sql: format!(
                "INSERT INTO \"{MIGRATION_TABLE}\" (\"table_name\", \"last_updated\", \"schema\") \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT (\"table_name\") DO UPDATE SET \
                 \"last_updated\" = excluded.\"last_updated\", \"schema\" = excluded.\"schema\""
            ),
            params: vec![
                stmt::Value::from(&table.name),
                stmt::Value::from(now),
                stmt::Value::from(schema),
            ],
        })?;

        Ok(())
    }

    fn get_saved_schema_for(&mut self, table: &Table) -> Result<Option<Table>> {
        let sql = format!("SELECT \"schema\" FROM \"{MIGRATION_TABLE}\" WHERE \"table_name\" = ?1");
        trace!(%sql, table = %table.name, "query");

        let saved: Option<Vec<u8>> = self
            .connection()?
            .query_row(&sql, [&table.name], |row| row.get(0))
            .optional()
            .map_err(Error::driver_operation_failed)?;

        saved
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Error::driver_operation_failed))
            .transpose()
    }

    fn get_row(&mut self, table: &Table, filters: &ColumnValues) -> Result<Option<Row>> {
        let stmt = Serializer::new(table).select(None, filters, Some(2))?;
        let mut rows = self.query(table, &stmt)?;

        // Ambiguous lookups are reported like missing ones
        if rows.len() == 1 {
            Ok(rows.pop())
        } else {
            Ok(None)
        }
    }

    fn select_rows(
        &mut self,
        table: &Table,
        query: Option<&stmt::Expr>,
        filters: &ColumnValues,
    ) -> Result<Vec<Row>> {
        let stmt = Serializer::new(table).select(query, filters, None)?;
        self.query(table, &stmt)
    }

    fn insert_row(&mut self, table: &Table, values: &ColumnValues) -> Result<Row> {
        let stmt = Serializer::new(table).insert(values)?;

        self.query(table, &stmt)?
            .pop()
            .ok_or_else(|| err!("insert into `{}` returned no row", table.name))
    }

    fn update_row(
        &mut self,
        table: &Table,
        key: &ColumnValues,
        column: ColumnId,
        value: &stmt::Value,
    ) -> Result<()> {
        let stmt = Serializer::new(table).update(key, column, value)?;
        let count = self.execute(&stmt)?;

        if count != 1 {
            return Err(Error::record_not_found(format!(
                "table={} key={:?}",
                table.name,
                key.values().collect::<Vec<_>>()
            )));
        }

        Ok(())
    }

    fn delete_row(&mut self, table: &Table, key: &ColumnValues) -> Result<()> {
        let stmt = Serializer::new(table).delete(key)?;
        let count = self.execute(&stmt)?;

        if count != 1 {
            return Err(Error::record_not_found(format!(
                "table={} key={:?}",
                table.name,
                key.values().collect::<Vec<_>>()
            )));
        }

        Ok(())
    }

    fn begin_transaction(&mut self, txn: &Transaction) -> Result<()> {
        self.connection()?;
        let sql = self.savepoints.begin(txn)?;

        if let Err(err) = self.execute_batch(&sql) {
            // Forget the transaction; storage never opened it
            let _ = self.savepoints.rollback(txn);
            return Err(err);
        }

        Ok(())
    }

    fn commit_transaction(&mut self, txn: &Transaction) -> Result<()> {
        let sql = self.savepoints.commit(txn)?;
        self.execute_batch(&sql)
    }

    fn rollback_transaction(&mut self, txn: &Transaction) -> Result<()> {
        let sql = self.savepoints.rollback(txn)?;
        self.execute_batch(&sql)
    }
}
