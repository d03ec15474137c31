use pegasus::{
    driver::Sqlite,
    schema::{FieldDef, ModelDef},
    stmt::{Type, Value},
    Db,
};
use std::path::PathBuf;
use tests::{models, DbTest, DriverOp, LoggingDriver};

fn car() -> ModelDef {
    ModelDef::new("Car").field(FieldDef::new("name", Type::String))
}

/// A database file unique to this process and test.
struct TempPath(PathBuf);

impl TempPath {
    fn new(name: &str) -> TempPath {
        let file = format!("pegasus-{}-{name}.db", std::process::id());
        let path = std::env::temp_dir().join(file);
        let _ = std::fs::remove_file(&path);
        TempPath(path)
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn connect_in_memory() {
    tests::init_tracing();

    let db = Db::builder().model(car()).connect("sqlite::memory:").unwrap();
    let ford = db.create("Car", [("name", "Ford")]).unwrap();
    assert_eq!(ford.get("id").unwrap(), Value::from(1));
}

#[test]
fn connect_rejects_other_databases() {
    let err = Db::builder()
        .model(car())
        .connect("postgres://localhost/cars")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unsupported database; scheme=postgres; url=postgres://localhost/cars"
    );

    assert!(Db::builder().model(car()).connect("not a url").is_err());
}

#[test]
fn table_name_prefix() {
    let boat = ModelDef::new("Boat").table_name("boats");
    let test = DbTest::new(models!(car(), boat).table_name_prefix("app_"));

    let tables: Vec<_> = test
        .schema()
        .db
        .tables
        .iter()
        .map(|table| table.name.clone())
        .collect();
    assert_eq!(tables, ["app_car", "app_boats"]);
    assert!(test.ops().contains(&DriverOp::CreateTable("app_car".to_string())));
}

#[test]
fn invalid_models_fail_the_build() {
    let err = DbTest::try_new(&mut models!(
        car(),
        ModelDef::new("Car").field(FieldDef::new("price", Type::I64))
    ))
    .err()
    .unwrap();
    assert!(err.is_invalid_schema());

    let dangling = ModelDef::new("Book").field(FieldDef::reference("author", "Author"));
    assert!(DbTest::try_new(&mut models!(dangling)).is_err());
}

#[test]
fn data_survives_reopening() {
    let path = TempPath::new("reopen");

    let db = Db::builder().model(car()).build(Sqlite::open(&path.0)).unwrap();
    db.create("Car", [("name", "Ford")]).unwrap();
    db.close().unwrap();

    let driver = LoggingDriver::new(Sqlite::open(&path.0));
    let ops = driver.ops_log_handle();
    let db = Db::builder().model(car()).build(driver).unwrap();

    let ford = db.get("Car", [("name", "Ford")]).unwrap().unwrap();
    assert_eq!(ford.get("id").unwrap(), Value::from(1));

    let ops = ops.lock().unwrap().clone();
    assert!(ops.contains(&DriverOp::GetSavedSchema("car".to_string())));
    assert!(!ops.iter().any(|op| matches!(op, DriverOp::CreateTable(_))));
}

#[test]
fn changed_models_keep_the_stored_table() {
    let path = TempPath::new("drift");

    Db::builder()
        .model(car())
        .build(Sqlite::open(&path.0))
        .unwrap()
        .close()
        .unwrap();

    let driver = LoggingDriver::new(Sqlite::open(&path.0));
    let ops = driver.ops_log_handle();
    let with_price = car().field(FieldDef::new("price", Type::I64).nullable());
    Db::builder().model(with_price).build(driver).unwrap();

    let ops = ops.lock().unwrap().clone();
    assert_eq!(
        ops,
        [
            DriverOp::Init,
            DriverOp::CreateMigrationTable,
            DriverOp::GetSavedSchema("car".to_string()),
        ]
    );
}

#[test]
fn destroy_removes_the_file() {
    let path = TempPath::new("destroy");

    let db = Db::builder().model(car()).build(Sqlite::open(&path.0)).unwrap();
    db.create("Car", [("name", "Ford")]).unwrap();
    assert!(path.0.exists());

    db.destroy().unwrap();
    assert!(!path.0.exists());
}
