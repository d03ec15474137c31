use super::Db;
use crate::{Model, Result};

use pegasus_core::{
    schema::{self, app::ModelDef},
    Driver,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registers models and binds them to a storage driver.
#[derive(Debug, Default)]
pub struct Builder {
    core: schema::Builder,
}

impl Builder {
    pub fn register<M: Model>(&mut self) -> &mut Self {
        self.core.model(M::define());
        self
    }

    pub fn model(&mut self, def: ModelDef) -> &mut Self {
        self.core.model(def);
        self
    }

    /// Set the table name prefix for all tables
    pub fn table_name_prefix(&mut self, prefix: &str) -> &mut Self {
        self.core.table_name_prefix(prefix);
        self
    }

    /// Connects to the database at `url`.
    ///
    /// Accepted forms are `sqlite::memory:` and `sqlite:<path>`.
    #[cfg(feature = "sqlite")]
    pub fn connect(&mut self, url: &str) -> Result<Db> {
        let parsed =
            url::Url::parse(url).map_err(pegasus_core::Error::driver_operation_failed)?;

        match parsed.scheme() {
            "sqlite" => self.build(pegasus_driver_sqlite::Sqlite::new(url)?),
            scheme => Err(pegasus_core::err!(
                "unsupported database; scheme={scheme}; url={url}"
            )),
        }
    }

    /// Resolves the schema, opens `driver` and creates missing tables.
    ///
    /// Tables recorded by an earlier run are left as they are; a
    /// difference with the current models is only logged.
    pub fn build(&mut self, driver: impl Driver) -> Result<Db> {
        let schema = self.core.build()?;
        let mut driver: Box<dyn Driver> = Box::new(driver);

        driver.init()?;
        driver.create_migration_table()?;

        for table in &schema.db.tables {
            match driver.get_saved_schema_for(table)? {
                Some(saved) => {
                    let diff = table.diff_from(&saved);
                    if !diff.is_empty() {
                        let changes = diff
                            .items()
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ");
                        warn!(table = %table.name, %changes, "saved schema differs from the models");
                    }
                }
                None => {
                    debug!(table = %table.name, "create table");
                    driver.create_table_for(table)?;
                }
            }
        }

        Ok(Db::new(Arc::new(schema), driver))
    }
}
