use pegasus::{
    schema::{FieldDef, ModelDef},
    stmt::{field, Expr, Type, Value},
    Instance,
};
use tests::{models, DbTest, DriverOp};

fn place() -> ModelDef {
    ModelDef::new("Place")
        .field(FieldDef::new("name", Type::String))
        .field(FieldDef::new("population", Type::I64))
        .field(FieldDef::new("nickname", Type::String).nullable())
}

fn setup() -> DbTest {
    let test = DbTest::new(&mut models!(place()));

    for (name, population, nickname) in [
        ("Le Cap Éternité", 0, None),
        ("Montréal", 1_762_949, Some("Metropolis")),
        ("Québec", 549_459, Some("Vieille Capitale")),
        ("Capitol Hill", 32_000, None),
    ] {
        let nickname = nickname.map(Value::from).unwrap_or_default();
        test.create(
            "Place",
            [
                ("name", Value::from(name)),
                ("population", Value::from(population)),
                ("nickname", nickname),
            ],
        )
        .unwrap();
    }

    test
}

fn names(instances: &[Instance]) -> Vec<String> {
    let mut names: Vec<String> = instances
        .iter()
        .map(|instance| instance.get_as::<String>("name").unwrap())
        .collect();
    names.sort();
    names
}

fn select(test: &DbTest, expr: impl Into<Option<Expr>>) -> Vec<String> {
    names(test.select("Place", expr).unwrap().exec().unwrap())
}

#[test]
fn equality() {
    let test = setup();

    assert_eq!(select(&test, field("name").eq("Québec")), ["Québec"]);
    assert!(select(&test, field("name").eq("québec")).is_empty());
    assert_eq!(select(&test, None).len(), 4);
}

#[test]
fn lowercase_matching_folds_unicode() {
    let test = setup();

    assert_eq!(
        select(&test, field("name").lower().eq("le cap éternité")),
        ["Le Cap Éternité"]
    );
    assert_eq!(
        select(&test, field("name").lower().eq("QUÉBEC".to_lowercase())),
        ["Québec"]
    );
}

#[test]
fn substring_matching() {
    let test = setup();

    assert_eq!(
        select(&test, field("name").contains("Cap")),
        ["Capitol Hill", "Le Cap Éternité"]
    );
    assert_eq!(
        select(&test, field("name").lower().contains("cap")),
        ["Capitol Hill", "Le Cap Éternité"]
    );
}

#[test]
fn comparisons_and_connectives() {
    let test = setup();

    assert_eq!(
        select(&test, field("population").gt(100_000)),
        ["Montréal", "Québec"]
    );
    assert_eq!(
        select(&test, field("population").le(32_000)),
        ["Capitol Hill", "Le Cap Éternité"]
    );
    assert_eq!(
        select(
            &test,
            field("population")
                .gt(0)
                .and(field("population").lt(1_000_000))
        ),
        ["Capitol Hill", "Québec"]
    );
    assert_eq!(
        select(
            &test,
            field("name")
                .eq("Montréal")
                .or(field("population").eq(0))
        ),
        ["Le Cap Éternité", "Montréal"]
    );
    assert_eq!(select(&test, field("name").ne("Québec")).len(), 3);
}

#[test]
fn null_comparisons() {
    let test = setup();

    assert_eq!(
        select(&test, field("nickname").eq(Value::Null)),
        ["Capitol Hill", "Le Cap Éternité"]
    );
    assert_eq!(
        select(&test, field("nickname").ne(Value::Null)),
        ["Montréal", "Québec"]
    );

    let err = test
        .select("Place", field("nickname").gt(Value::Null))
        .unwrap()
        .exec()
        .unwrap_err();
    assert!(err.to_string().contains("cannot compare with NULL"));
}

#[test]
fn filter_by_fields() {
    let test = setup();

    let query = test
        .select("Place", field("population").gt(0))
        .unwrap()
        .filter_by("nickname", "Metropolis");
    assert_eq!(names(query.exec().unwrap()), ["Montréal"]);

    // A null filter matches absent values
    let query = test
        .select("Place", None)
        .unwrap()
        .filter_by("nickname", Value::Null)
        .filter(field("population").gt(0));
    assert_eq!(names(query.exec().unwrap()), ["Capitol Hill"]);
}

#[test]
fn queries_are_lazy_and_cached() {
    let test = setup();
    test.clear_ops();

    let query = test.select("Place", field("population").gt(0)).unwrap();
    assert_eq!(test.reads(), 0);

    assert_eq!(query.len().unwrap(), 3);
    assert_eq!(query.iter().unwrap().count(), 3);
    assert_eq!((&query).into_iter().count(), 3);
    assert_eq!(test.reads(), 1);

    // Later writes do not reach an evaluated query
    test.create(
        "Place",
        [("name", Value::from("Tadoussac")), ("population", Value::from(850))],
    )
    .unwrap();
    assert_eq!(query.len().unwrap(), 3);

    let query = query.filter_by("name", "Tadoussac");
    assert_eq!(query.len().unwrap(), 1);
    assert_eq!(test.reads(), 2);

    let selects = test
        .ops()
        .into_iter()
        .filter(|op| matches!(op, DriverOp::SelectRows { .. }))
        .count();
    assert_eq!(selects, 2);
}

#[test]
fn results_are_live_instances() {
    let test = setup();

    let quebec = test.get("Place", [("name", "Québec")]).unwrap().unwrap();
    let query = test.select("Place", field("population").gt(100_000)).unwrap();

    assert!(query.contains(&quebec).unwrap());

    test.set(&quebec, "population", 550_000).unwrap();
    let found = query.to_vec().unwrap();
    assert!(found
        .iter()
        .any(|place| place.get("population").unwrap() == Value::from(550_000)));
}

#[test]
fn unknown_fields() {
    let test = setup();

    let err = test
        .select("Place", field("altitude").gt(0))
        .unwrap()
        .exec()
        .unwrap_err();
    assert!(err.is_unknown_field());
    assert_eq!(err.to_string(), "model Place: no field named `altitude`");

    let query = test.select("Place", None).unwrap().filter_by("altitude", 3);
    assert!(query.exec().unwrap_err().root().is_unknown_field());

    // Iterating a failing query yields nothing
    assert_eq!((&query).into_iter().count(), 0);
}

#[test]
fn relation_fields_filter_by_counterpart() {
    let author = ModelDef::new("Author")
        .field(FieldDef::new("name", Type::String))
        .field(FieldDef::reference("book", "Book").nullable());
    let book = ModelDef::new("Book")
        .field(FieldDef::new("title", Type::String))
        .field(FieldDef::reference("author", "Author"));
    let test = DbTest::new(&mut models!(author, book));

    let hugo = test.create("Author", [("name", "Hugo")]).unwrap();
    let dumas = test.create("Author", [("name", "Dumas")]).unwrap();
    let miserables = test
        .create(
            "Book",
            [
                ("title", Value::from("Les Misérables")),
                ("author", Value::from(&hugo)),
            ],
        )
        .unwrap();
    test.create(
        "Book",
        [
            ("title", Value::from("Les Trois Mousquetaires")),
            ("author", Value::from(&dumas)),
        ],
    )
    .unwrap();

    let by_hugo = test.select("Book", field("author").eq(&hugo)).unwrap();
    assert_eq!(by_hugo.to_vec().unwrap(), vec![miserables]);
}

#[test]
fn closed_database() {
    let test = setup();
    let query = test.select("Place", None).unwrap();

    test.close().unwrap();
    assert_eq!(query.exec().unwrap_err().to_string(), "the database is closed");
}
