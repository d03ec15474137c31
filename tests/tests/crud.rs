use pegasus::{
    schema::{FieldDef, ModelDef},
    stmt::{field, Type, Value},
    Instance, Model, Result,
};
use tests::{DbTest, DriverOp};

#[derive(Debug)]
struct Car(Instance);

impl Model for Car {
    const NAME: &'static str = "Car";

    fn define() -> ModelDef {
        ModelDef::new("Car")
            .field(FieldDef::new("name", Type::String))
            .field(FieldDef::new("price", Type::I64))
            .field(FieldDef::new("notes", Type::String).nullable())
            .field(FieldDef::new("wheels", Type::I64).default(4))
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        Ok(Car(instance))
    }

    fn as_instance(&self) -> &Instance {
        &self.0
    }
}

fn setup() -> DbTest {
    let mut builder = pegasus::Db::builder();
    builder.register::<Car>();
    DbTest::new(&mut builder)
}

fn ford(test: &DbTest) -> Car {
    Car::create(
        test,
        [("name", Value::from("Ford")), ("price", Value::from(10000))],
    )
    .unwrap()
}

#[test]
fn ford_lifecycle() {
    let test = setup();
    let ford = ford(&test);
    let id = ford.0.get("id").unwrap();
    assert_eq!(id, Value::from(1));

    let found = Car::get(&test, [("id", id.clone())]).unwrap().unwrap();
    assert_eq!(found.0, ford.0);

    ford.set(&test, "price", 12000).unwrap();
    assert_eq!(ford.0.get_as::<i64>("price").unwrap(), 12000);

    // Storage agrees
    let stored = Car::all(&test, field("price").eq(12000)).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, ford.0);

    ford.delete(&test).unwrap();
    assert!(ford.0.is_deleted());
    assert!(Car::get(&test, [("id", id)]).unwrap().is_none());
}

#[test]
fn defaults_are_applied() {
    let test = setup();
    let ford = ford(&test);

    assert_eq!(ford.0.get("wheels").unwrap(), Value::from(4));
    assert_eq!(ford.0.get("notes").unwrap(), Value::Null);
    assert_eq!(ford.0.get_as::<Option<String>>("notes").unwrap(), None);

    assert_eq!(
        ford.0.values(),
        vec![
            ("id".to_string(), Value::from(1)),
            ("name".to_string(), Value::from("Ford")),
            ("price".to_string(), Value::from(10000)),
            ("notes".to_string(), Value::Null),
            ("wheels".to_string(), Value::from(4)),
        ]
    );
}

#[test]
fn round_trip_through_storage() {
    let test = setup();
    let id = {
        let car = Car::create(
            &test,
            [
                ("name", Value::from("Fiat")),
                ("price", Value::from(8000)),
                ("notes", Value::from("red")),
            ],
        )
        .unwrap();
        car.0.get("id").unwrap()
    };

    // The only handle is gone, so the next read goes to storage
    test.clear_ops();
    let fiat = Car::get(&test, [("id", id)]).unwrap().unwrap();
    assert_eq!(test.reads(), 1);

    assert_eq!(fiat.0.get("name").unwrap(), Value::from("Fiat"));
    assert_eq!(fiat.0.get("price").unwrap(), Value::from(8000));
    assert_eq!(fiat.0.get("notes").unwrap(), Value::from("red"));
    assert_eq!(fiat.0.get("wheels").unwrap(), Value::from(4));
}

#[test]
fn missing_argument() {
    let test = setup();
    test.clear_ops();

    let err = Car::create(&test, [("name", "Ford")]).unwrap_err();
    assert!(err.is_missing_argument());
    assert_eq!(err.to_string(), "model Car: missing the argument `price`");

    // Nothing reached storage
    assert!(!test
        .ops()
        .iter()
        .any(|op| matches!(op, DriverOp::InsertRow { .. })));
}

#[test]
fn storage_assigned_fields() {
    let test = setup();

    let err = Car::create(
        &test,
        [
            ("id", Value::from(7)),
            ("name", Value::from("Ford")),
            ("price", Value::from(10000)),
        ],
    )
    .unwrap_err();
    assert!(err.is_forbidden_argument());
    assert_eq!(
        err.to_string(),
        "model Car: can't set `id`, let the storage engine do it"
    );

    let ford = ford(&test);
    let err = ford.set(&test, "id", 7).unwrap_err();
    assert!(err.is_set_by_storage());
    assert_eq!(ford.0.get("id").unwrap(), Value::from(1));
}

#[test]
fn unknown_fields_and_wrong_types() {
    let test = setup();
    let ford = ford(&test);

    let err = ford.set(&test, "colour", "blue").unwrap_err();
    assert!(err.is_unknown_field());
    assert_eq!(err.to_string(), "model Car: no field named `colour`");

    let err = ford.set(&test, "price", "cheap").unwrap_err();
    assert!(err.root().is_type_conversion());
    assert_eq!(
        err.to_string(),
        "model Car: field `price`: cannot convert String to I64"
    );

    let err = ford.set(&test, "name", Value::Null).unwrap_err();
    assert!(err.root().is_type_conversion());

    assert!(ford.0.get_as::<String>("price").is_err());
    assert_eq!(ford.0.get("price").unwrap(), Value::from(10000));
}

#[test]
fn nullable_fields_can_be_cleared() {
    let test = setup();
    let ford = ford(&test);

    ford.set(&test, "notes", "spare tyre").unwrap();
    assert_eq!(
        ford.0.get_as::<Option<String>>("notes").unwrap().as_deref(),
        Some("spare tyre")
    );

    ford.set(&test, "notes", Value::Null).unwrap();
    assert_eq!(ford.0.get("notes").unwrap(), Value::Null);
}

#[test]
fn get_without_single_match_is_none() {
    let test = setup();
    ford(&test);

    assert!(Car::get(&test, [("name", "Fiat")]).unwrap().is_none());

    Car::create(
        &test,
        [("name", Value::from("Ford")), ("price", Value::from(10000))],
    )
    .unwrap();
    assert!(Car::get(&test, [("name", "Ford")]).unwrap().is_none());
    assert_eq!(
        Car::select(&test, field("name").eq("Ford"))
            .unwrap()
            .len()
            .unwrap(),
        2
    );
}

#[test]
fn deleted_instances_reject_writes() {
    let test = setup();
    let ford = ford(&test);
    ford.delete(&test).unwrap();

    assert!(ford.set(&test, "price", 1).unwrap_err().is_instance_deleted());
    assert!(ford.delete(&test).unwrap_err().is_instance_deleted());
    assert_eq!(
        ford.delete(&test).unwrap_err().to_string(),
        "model Car: the instance was deleted"
    );
}

#[test]
fn closed_database() {
    let test = setup();
    let ford = ford(&test);

    test.close().unwrap();
    test.close().unwrap();

    assert_eq!(
        ford.set(&test, "price", 1).unwrap_err().to_string(),
        "the database is closed"
    );
    assert!(Car::get(&test, [("id", 1)]).is_err());
    assert!(test.ops().contains(&DriverOp::Close));
}

#[test]
fn unknown_model() {
    let test = setup();
    let err = test.create("Boat", [("name", "Bounty")]).unwrap_err();
    assert_eq!(err.to_string(), "no model named Boat is registered");
}
