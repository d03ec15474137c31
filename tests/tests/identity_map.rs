use pegasus::{
    schema::{FieldDef, ModelDef},
    stmt::{field, Type, Value},
};
use tests::{models, DbTest};

fn car() -> ModelDef {
    ModelDef::new("Car")
        .field(FieldDef::new("name", Type::String))
        .field(FieldDef::new("price", Type::I64))
}

fn country() -> ModelDef {
    ModelDef::new("Country")
        .field(FieldDef::new("code", Type::String).primary_key())
        .field(FieldDef::new("name", Type::String))
}

fn create_car(test: &DbTest, name: &str, price: i64) -> pegasus::Instance {
    test.create(
        "Car",
        [("name", Value::from(name)), ("price", Value::from(price))],
    )
    .unwrap()
}

#[test]
fn one_instance_per_key() {
    let test = DbTest::new(&mut models!(car()));
    let ford = create_car(&test, "Ford", 10000);

    let a = test.get("Car", [("id", 1)]).unwrap().unwrap();
    let b = test.get("Car", [("id", 1)]).unwrap().unwrap();
    assert_eq!(a, ford);
    assert_eq!(b, ford);
}

#[test]
fn primary_key_lookups_skip_storage() {
    let test = DbTest::new(&mut models!(car()));
    let ford = create_car(&test, "Ford", 10000);
    test.clear_ops();

    assert_eq!(test.get("Car", [("id", 1)]).unwrap(), Some(ford.clone()));
    assert_eq!(test.reads(), 0);

    // Other lookups read the row but hand back the live instance
    assert_eq!(test.get("Car", [("name", "Ford")]).unwrap(), Some(ford));
    assert_eq!(test.reads(), 1);
}

#[test]
fn queries_return_live_instances() {
    let test = DbTest::new(&mut models!(car()));
    let ford = create_car(&test, "Ford", 10000);
    let fiat = create_car(&test, "Fiat", 8000);

    let query = test.select("Car", None).unwrap();
    let all = query.exec().unwrap();
    assert_eq!(all, &[ford.clone(), fiat.clone()][..]);

    let cheap = test.select("Car", field("price").lt(9000)).unwrap();
    assert!(cheap.contains(&fiat).unwrap());
    assert!(!cheap.contains(&ford).unwrap());
}

#[test]
fn released_instances_are_reloaded() {
    let test = DbTest::new(&mut models!(car()));
    drop(create_car(&test, "Ford", 10000));
    test.clear_ops();

    let ford = test.get("Car", [("id", 1)]).unwrap().unwrap();
    assert_eq!(test.reads(), 1);
    assert_eq!(ford.get("price").unwrap(), Value::from(10000));

    // Now live again
    assert_eq!(test.get("Car", [("id", 1)]).unwrap(), Some(ford));
    assert_eq!(test.reads(), 1);
}

#[test]
fn primary_key_change_rekeys() {
    let test = DbTest::new(&mut models!(country()));
    let france = test
        .create(
            "Country",
            [("code", Value::from("FR")), ("name", Value::from("France"))],
        )
        .unwrap();

    test.set(&france, "code", "FX").unwrap();

    assert_eq!(test.get("Country", [("code", "FX")]).unwrap(), Some(france));
    assert_eq!(test.get("Country", [("code", "FR")]).unwrap(), None);
}

#[test]
fn deleted_instances_leave_the_map() {
    let test = DbTest::new(&mut models!(car()));
    let ford = create_car(&test, "Ford", 10000);

    test.delete(&ford).unwrap();
    test.clear_ops();

    assert_eq!(test.get("Car", [("id", 1)]).unwrap(), None);
    assert_eq!(test.reads(), 1);
}
