use pegasus::{
    driver::{Transaction, TransactionId},
    schema::{FieldDef, ModelDef},
    stmt::{field, Type, Value},
    Error, Instance,
};
use pegasus_core::err;
use tests::{models, DbTest, DriverOp};

fn car() -> ModelDef {
    ModelDef::new("Car")
        .field(FieldDef::new("name", Type::String))
        .field(FieldDef::new("price", Type::I64))
}

fn setup() -> (DbTest, Instance) {
    let test = DbTest::new(&mut models!(car()));
    let ford = test
        .create(
            "Car",
            [("name", Value::from("Ford")), ("price", Value::from(10000))],
        )
        .unwrap();
    (test, ford)
}

/// True if storage holds exactly one car at `price`.
///
/// The filter runs in storage, so live instances cannot mask the row.
fn stored(test: &DbTest, price: i64) -> bool {
    test.select("Car", field("price").eq(price))
        .unwrap()
        .len()
        .unwrap()
        == 1
}

fn txn(id: u64, parent: Option<u64>) -> Transaction {
    Transaction {
        id: TransactionId(id),
        parent: parent.map(TransactionId),
    }
}

#[test]
fn rollback_restores_fields() {
    let (test, ford) = setup();

    let err = test
        .transaction(|db| {
            db.set(&ford, "price", 11000)?;
            db.set(&ford, "price", 12000)?;
            Err::<(), Error>(err!("boom"))
        })
        .unwrap_err();

    // The closure's error comes back unchanged
    assert_eq!(err.to_string(), "boom");
    assert!(!test.in_transaction());

    assert_eq!(ford.get("price").unwrap(), Value::from(10000));
    assert!(stored(&test, 10000));
    assert_eq!(
        test.get("Car", [("id", 1)]).unwrap().unwrap().get("price").unwrap(),
        Value::from(10000)
    );
}

#[test]
fn commit_keeps_changes() {
    let (test, ford) = setup();

    let price = test
        .transaction(|db| {
            db.set(&ford, "price", 12000)?;
            ford.get_as::<i64>("price")
        })
        .unwrap();

    assert_eq!(price, 12000);
    assert!(stored(&test, 12000));
    assert!(test.ops().contains(&DriverOp::Commit(txn(0, None))));
}

#[test]
fn consecutive_rollbacks() {
    let (test, ford) = setup();

    for price in [1, 2] {
        let result = test.transaction(|db| {
            db.set(&ford, "price", price)?;
            Err::<(), Error>(err!("rolled back"))
        });
        assert!(result.is_err());
        assert_eq!(ford.get("price").unwrap(), Value::from(10000));
    }

    let ops = test.ops();
    assert!(ops.contains(&DriverOp::Rollback(txn(0, None))));
    assert!(ops.contains(&DriverOp::Rollback(txn(1, None))));
    assert!(stored(&test, 10000));
}

#[test]
fn nested_failure_keeps_outer_work() {
    let test = DbTest::new(&mut models!(car()));

    let (a, b) = test
        .transaction(|db| {
            let a = db.create(
                "Car",
                [("name", Value::from("A")), ("price", Value::from(1))],
            )?;

            let mut b = None;
            let inner = db.transaction(|db| {
                b = Some(db.create(
                    "Car",
                    [("name", Value::from("B")), ("price", Value::from(2))],
                )?);
                Err::<(), Error>(err!("inner failure"))
            });
            assert!(inner.is_err());

            Ok::<_, Error>((a, b))
        })
        .unwrap();

    let b = b.unwrap();
    assert!(!a.is_deleted());
    assert!(b.is_deleted());

    let names: Vec<_> = test
        .select("Car", None)
        .unwrap()
        .to_vec()
        .unwrap()
        .iter()
        .map(|car| car.get("name").unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("A")]);

    assert_eq!(test.get("Car", [("name", "B")]).unwrap(), None);

    let ops = test.ops();
    assert!(ops.contains(&DriverOp::Begin(txn(1, Some(0)))));
    assert!(ops.contains(&DriverOp::Rollback(txn(1, Some(0)))));
    assert!(ops.contains(&DriverOp::Commit(txn(0, None))));
}

#[test]
fn outer_rollback_undoes_committed_inner_work() {
    let (test, ford) = setup();

    let outer = test.begin().unwrap();
    test.transaction(|db| db.set(&ford, "price", 1)).unwrap();
    assert_eq!(ford.get("price").unwrap(), Value::from(1));

    outer.rollback().unwrap();

    assert_eq!(ford.get("price").unwrap(), Value::from(10000));
    assert!(stored(&test, 10000));
}

#[test]
fn dropped_guard_rolls_back() {
    let (test, ford) = setup();

    {
        let _txn = test.begin().unwrap();
        test.set(&ford, "name", "Fiat").unwrap();
        assert!(test.in_transaction());
    }

    assert!(!test.in_transaction());
    assert_eq!(ford.get("name").unwrap(), Value::from("Ford"));
}

#[test]
fn rolled_back_delete_is_undone() {
    let (test, ford) = setup();

    let txn = test.begin().unwrap();
    test.delete(&ford).unwrap();
    assert!(ford.is_deleted());
    txn.rollback().unwrap();

    assert!(!ford.is_deleted());
    assert_eq!(test.get("Car", [("id", 1)]).unwrap(), Some(ford.clone()));

    // Still writable
    test.set(&ford, "price", 9000).unwrap();
    assert!(stored(&test, 9000));
}

#[test]
fn explicit_commit() {
    let (test, ford) = setup();

    let txn = test.begin().unwrap();
    assert_eq!(txn.id(), TransactionId(0));
    test.set(&ford, "price", 500).unwrap();
    txn.commit().unwrap();

    assert!(!test.in_transaction());
    assert!(stored(&test, 500));
    assert_eq!(
        test.select("Car", field("price").eq(500)).unwrap().len().unwrap(),
        1
    );
}

#[test]
fn committing_over_an_open_nested_transaction() {
    let (test, ford) = setup();
    test.clear_ops();

    let outer = test.begin().unwrap();
    test.set(&ford, "price", 1).unwrap();
    let inner = test.begin().unwrap();
    test.set(&ford, "price", 2).unwrap();

    let err = outer.commit().unwrap_err();
    assert!(err.is_invalid_transaction());

    // Both frames are gone, in memory and in storage
    assert!(!test.in_transaction());
    assert_eq!(ford.get("price").unwrap(), Value::from(10000));
    assert!(stored(&test, 10000));

    let ops = test.ops();
    assert!(ops.contains(&DriverOp::Rollback(txn(1, Some(0)))));
    assert!(ops.contains(&DriverOp::Rollback(txn(0, None))));

    // Finishing the nested guard afterwards has nothing left to do
    drop(inner);
    assert!(!test.in_transaction());

    test.clear_ops();
    test.transaction(|db| db.set(&ford, "price", 3)).unwrap();
    assert_eq!(test.ops()[..1], [DriverOp::Begin(txn(2, None))]);
    assert!(stored(&test, 3));
}

#[test]
fn rolling_back_over_an_open_nested_transaction() {
    let (test, ford) = setup();

    let outer = test.begin().unwrap();
    let inner = test.begin().unwrap();
    test.set(&ford, "price", 2).unwrap();

    outer.rollback().unwrap();
    assert!(!test.in_transaction());
    assert_eq!(ford.get("price").unwrap(), Value::from(10000));

    inner.rollback().unwrap();
    assert!(!test.in_transaction());
    assert!(stored(&test, 10000));
}
