mod logging_driver;
pub use logging_driver::{DriverOp, LoggingDriver};

use pegasus::{db::Builder, driver::Sqlite, Db};
use std::sync::{Arc, Mutex, Once};

/// Installs a `tracing` subscriber once per test binary.
///
/// Output is captured by the test harness; set `RUST_LOG=pegasus=debug`
/// to see it.
pub fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A database over in-memory SQLite whose driver calls are recorded.
pub struct DbTest {
    pub db: Db,
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

impl DbTest {
    pub fn new(builder: &mut Builder) -> DbTest {
        Self::try_new(builder).unwrap()
    }

    pub fn try_new(builder: &mut Builder) -> pegasus::Result<DbTest> {
        init_tracing();

        let driver = LoggingDriver::new(Sqlite::in_memory());
        let ops_log = driver.ops_log_handle();
        let db = builder.build(driver)?;

        Ok(DbTest { db, ops_log })
    }

    /// Recorded driver calls since the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> Vec<DriverOp> {
        self.ops_log.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops_log.lock().unwrap().clear();
    }

    /// Number of recorded calls reading rows.
    pub fn reads(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, DriverOp::GetRow { .. } | DriverOp::SelectRows { .. }))
            .count()
    }
}

impl std::ops::Deref for DbTest {
    type Target = Db;

    fn deref(&self) -> &Db {
        &self.db
    }
}

/// A builder with the given model definitions registered.
#[macro_export]
macro_rules! models {
    (
        $( $def:expr ),* $(,)?
    ) => {{
        let mut builder = pegasus::Db::builder();
        $( builder.model($def); )*
        builder
    }};
}
