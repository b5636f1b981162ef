use ferrous_resolve::{
    Constructor, Parameter, Resolver, ServiceCollection, ServiceConfiguration, TypeDef, TypeRef,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Db {
    conn: String,
}

struct App {
    db: Arc<Db>,
}

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

fn wired(db_contract: Option<&str>) -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Db").with_type::<Db>().constructor(Constructor::new(
        vec![Parameter::service("conn", t("String"))],
        |args| Ok(Db { conn: args.value("conn")? }),
    )));
    let mut db = Parameter::service("db", t("Db"));
    if let Some(contract) = db_contract {
        db = db.contract(contract);
    }
    services.add_type(TypeDef::concrete("App").with_type::<App>().constructor(Constructor::new(
        vec![db],
        |args| Ok(App { db: args.get::<Db>("db")? }),
    )));
    services.configure(t("Db"), ServiceConfiguration::new().dependency_value("conn", "default".to_string()));
    services.contract("prod", |c| {
        c.configure(t("Db"), ServiceConfiguration::new().dependency_value("conn", "p".to_string()));
    });
    services.contract("test", |c| {
        c.configure(t("Db"), ServiceConfiguration::new().dependency_value("conn", "t".to_string()));
    });
    services
}

#[test]
fn contract_selects_configuration_section() {
    let container = wired(None).build();
    assert_eq!(container.get::<Db>().unwrap().conn, "default");
    assert_eq!(container.get_in::<Db>(&["prod"]).unwrap().conn, "p");
    assert_eq!(container.get_in::<Db>(&["test"]).unwrap().conn, "t");
}

#[test]
fn consumed_contract_propagates_to_consumers() {
    let container = wired(None).build();
    let app = container.get_in::<App>(&["prod"]).unwrap();
    assert_eq!(app.db.conn, "p");

    let record = container
        .cached_records()
        .into_iter()
        .find(|r| r.name().to_string() == "App[prod]")
        .unwrap();
    assert_eq!(record.used_contracts(), ["prod"]);
    assert_eq!(record.trace(), "App[prod]\n\tDb[prod]\n\t\tconn -> \"p\" - configured\n");
}

#[test]
fn contract_names_ignore_case() {
    let container = wired(None).build();
    let lower = container.get_in::<Db>(&["prod"]).unwrap();
    let upper = container.get_in::<Db>(&["PROD"]).unwrap();
    assert_eq!(upper.conn, "p");
    assert_eq!(lower.conn, upper.conn);
}

#[test]
fn unconsumed_contracts_share_the_plain_instance() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Clock").constructor(Constructor::new(vec![], move |_| {
        Ok(counter.fetch_add(1, Ordering::SeqCst))
    })));
    services.contract("x", |_| {});
    let container = services.build();

    let under_contract = container.get_service_in(&t("Clock"), &["x"]).unwrap();
    let plain = container.get_service(&t("Clock")).unwrap();
    assert!(Arc::ptr_eq(&under_contract, &plain));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn plain_instance_is_adopted_by_later_contract_requests() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Clock").constructor(Constructor::new(vec![], move |_| {
        Ok(counter.fetch_add(1, Ordering::SeqCst))
    })));
    services.contract("x", |_| {});
    let container = services.build();

    let plain = container.get_service(&t("Clock")).unwrap();
    let under_contract = container.get_service_in(&t("Clock"), &["x"]).unwrap();
    assert!(Arc::ptr_eq(&under_contract, &plain));
    // The contract path is built once to learn it consumes nothing, then cached.
    assert_eq!(built.load(Ordering::SeqCst), 2);
    container.get_service_in(&t("Clock"), &["x"]).unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn parameter_contract_applies_to_its_dependency_only() {
    let container = wired(Some("test")).build();
    let app = container.get::<App>().unwrap();
    assert_eq!(app.db.conn, "t");

    let record = container.resolve_service(&t("App")).unwrap();
    assert!(record.used_contracts().is_empty());
    assert_eq!(record.trace(), "App\n\tDb[test]\n\t\tconn -> \"t\" - configured\n");
}

#[test]
fn redeclaring_an_active_contract_fails() {
    let container = wired(Some("PROD")).build();
    let error = container.get_in::<App>(&["prod"]).err().unwrap();
    assert_eq!(
        error.message(),
        "contract [PROD] already declared, all declared contracts [prod->PROD]"
    );
}

#[test]
fn union_contract_yields_one_instance_per_member() {
    let mut services = wired(None);
    services.union_contract("all", ["prod", "test"]);
    let container = services.build();

    let values = container.get_all_services_in(&t("Db"), &["all"]).unwrap();
    let conns: Vec<String> = values
        .into_iter()
        .map(|v| v.downcast::<Db>().unwrap().conn.clone())
        .collect();
    assert_eq!(conns, vec!["p", "t"]);

    let error = container.get_service_in(&t("Db"), &["all"]).unwrap_err();
    assert!(error.message().starts_with("many instances for [Db[all]]"));
}

#[test]
fn union_with_unknown_member_fails() {
    let mut services = wired(None);
    services.union_contract("broken", ["prod", "nosuch"]);
    let container = services.build();
    let error = container.get_service_in(&t("Db"), &["broken"]).unwrap_err();
    assert_eq!(error.message(), "union [broken] references unknown contract [nosuch]");
}
