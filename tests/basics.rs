use ferrous_resolve::{
    Arguments, Constructor, Container, ContainerError, MapParameters, Parameter, Resolver,
    ServiceCollection, ServiceConfiguration, ServiceStatus, TypeDef, TypeRef,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Clock {
    id: usize,
}

struct Scheduler {
    clock: Arc<Clock>,
}

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

fn clock_collection(counter: Arc<AtomicUsize>) -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Clock").with_type::<Clock>().constructor(Constructor::new(
        vec![],
        move |_| Ok(Clock { id: counter.fetch_add(1, Ordering::SeqCst) }),
    )));
    services.add_type(TypeDef::concrete("Scheduler").with_type::<Scheduler>().constructor(
        Constructor::new(vec![Parameter::service("clock", t("Clock"))], |args| {
            Ok(Scheduler { clock: args.get::<Clock>("clock")? })
        }),
    ));
    services
}

#[test]
fn same_type_resolves_to_same_instance() {
    let container = clock_collection(Arc::new(AtomicUsize::new(0))).build();
    let a = container.get::<Clock>().unwrap();
    let b = container.get::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let scheduler = container.get::<Scheduler>().unwrap();
    assert!(Arc::ptr_eq(&scheduler.clock, &a));
}

#[test]
fn create_builds_fresh_instances() {
    let counter = Arc::new(AtomicUsize::new(0));
    let container = clock_collection(counter.clone()).build();
    let shared = container.get::<Clock>().unwrap();
    let fresh = container.create::<Clock>(None).unwrap();
    assert!(!Arc::ptr_eq(&shared, &fresh));
    assert_ne!(shared.id, fresh.id);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn unregistered_type_is_an_error() {
    let container = ServiceCollection::new().build();
    let error = container.get_service(&t("Missing")).unwrap_err();
    assert_eq!(error.message(), "type [Missing] is not registered");
    assert_eq!(error.trace(), Some("!Missing <---------------\n"));
}

#[test]
fn unknown_rust_type_is_reported() {
    struct Unregistered;
    let container = ServiceCollection::new().build();
    assert!(matches!(
        container.get::<Unregistered>(),
        Err(ContainerError::UnknownRustType(_))
    ));
}

#[test]
fn simple_types_cannot_be_built() {
    let container = ServiceCollection::new().build();
    let error = container.get_service(&t("i32")).unwrap_err();
    assert!(error.message().starts_with("can't create simple type [i32]"));
}

#[test]
fn simple_type_with_configured_instance_resolves() {
    let mut services = ServiceCollection::new();
    services.configure(t("String"), ServiceConfiguration::new().instance("hello".to_string()));
    let container = services.build();
    assert_eq!(&*container.get::<String>().unwrap(), "hello");
}

#[test]
fn container_resolves_itself() {
    let container = ServiceCollection::new().build();
    let me = container.get::<Container>().unwrap();
    assert_eq!(me.id(), container.id());
}

#[test]
fn abstract_types_fan_out_over_implementors() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Plugin"));
    for name in ["Alpha", "Beta"] {
        services.add_type(
            TypeDef::concrete(name)
                .implements(t("Plugin"))
                .constructor(Constructor::new(vec![], move |_| Ok(name.to_string()))),
        );
    }
    let container = services.build();

    let all = container.get_all_as::<String>(&t("Plugin")).unwrap();
    let names: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);

    let error = container.get_service(&t("Plugin")).unwrap_err();
    assert!(error.message().starts_with("many instances for [Plugin]"));

    let record = container.resolve_service(&t("Plugin")).unwrap();
    assert_eq!(record.trace(), "++Plugin\n\tAlpha\n\tBeta\n");
}

#[test]
fn abstract_without_implementors_is_empty_until_a_value_is_demanded() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Plugin"));
    let container = services.build();

    assert!(container.get_all_services(&t("Plugin")).unwrap().is_empty());
    let error = container.get_service(&t("Plugin")).unwrap_err();
    assert!(error.message().starts_with("no instances for [Plugin]"));
}

#[test]
fn configured_implementation_list_replaces_discovery() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Store"));
    for name in ["Memory", "Disk"] {
        services.add_type(
            TypeDef::concrete(name)
                .implements(t("Store"))
                .constructor(Constructor::new(vec![], move |_| Ok(name.to_string()))),
        );
    }
    services.configure(t("Store"), ServiceConfiguration::new().implementation(t("Disk")));
    let container = services.build();
    assert_eq!(&*container.get_as::<String>(&t("Store")).unwrap(), "Disk");
}

#[test]
fn per_request_types_are_only_created() {
    let mut services = ServiceCollection::new();
    services.add_type(
        TypeDef::concrete("Request")
            .per_request()
            .constructor(Constructor::new(vec![], |_| Ok(7u32))),
    );
    let container = services.build();

    let error = container.get_service(&t("Request")).unwrap_err();
    assert!(error.message().contains("per-request"));
    let value = container.create_service(&t("Request"), None).unwrap();
    assert_eq!(value.downcast_ref::<u32>(), Some(&7));
}

#[test]
fn constructor_selection_requires_a_designated_one() {
    let mut services = ServiceCollection::new();
    services.add_type(
        TypeDef::concrete("Ambiguous")
            .constructor(Constructor::new(vec![], |_| Ok(1u8)))
            .constructor(Constructor::new(vec![], |_| Ok(2u8))),
    );
    services.add_type(
        TypeDef::concrete("Chosen")
            .constructor(Constructor::new(vec![], |_| Ok(1u8)))
            .constructor(Constructor::new(vec![], |_| Ok(2u8)).designated()),
    );
    let container = services.build();

    let error = container.get_service(&t("Ambiguous")).unwrap_err();
    assert!(error.message().contains("mark one as designated"));
    assert_eq!(*container.get_as::<u8>(&t("Chosen")).unwrap(), 2);
}

#[test]
fn constructor_failures_and_panics_become_errors() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Fails").constructor(Constructor::new::<(), _>(vec![], |_| {
        Err("boom".into())
    })));
    services.add_type(TypeDef::concrete("Panics").constructor(Constructor::new::<(), _>(vec![], |_| {
        panic!("kaboom")
    })));
    let container = services.build();

    let error = container.get_service(&t("Fails")).unwrap_err();
    assert_eq!(error.message(), "construction of [Fails] failed: boom");
    assert!(std::error::Error::source(&error).is_some());

    let error = container.get_service(&t("Panics")).unwrap_err();
    assert_eq!(error.message(), "construction of [Panics] panicked: kaboom");
}

#[test]
fn failed_records_are_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Flaky").constructor(Constructor::new::<(), _>(
        vec![],
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err("down".into())
        },
    )));
    let container = services.build();
    assert!(container.get_service(&t("Flaky")).is_err());
    assert!(container.get_service(&t("Flaky")).is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

struct Server {
    host: String,
    port: u16,
}

fn server_collection() -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Server").with_type::<Server>().constructor(
        Constructor::new(
            vec![
                Parameter::service("host", t("String")).default_value("localhost".to_string()),
                Parameter::service("port", t("u16")),
            ],
            |args| Ok(Server { host: args.value("host")?, port: args.value("port")? }),
        ),
    ));
    services
}

#[test]
fn call_time_arguments_bind_by_name() {
    let container = server_collection().build();
    let server = container
        .create::<Server>(Some(Arguments::new().with("port", 8080u16)))
        .unwrap();
    assert_eq!(server.host, "localhost");
    assert_eq!(server.port, 8080);
}

#[test]
fn unused_arguments_are_rejected() {
    let container = server_collection().build();
    let error = container
        .create::<Server>(Some(Arguments::new().with("port", 1u16).with("verbose", true)))
        .err()
        .unwrap();
    assert!(error.message().starts_with("unused arguments [verbose]"));
}

#[test]
fn parameter_sources_precede_configured_values() {
    let mut services = server_collection();
    services.configure(t("Server"), ServiceConfiguration::new().dependency_value("port", 1u16));
    services.parameters(MapParameters::new().with("Server.port", 9090).with("port", 1));
    let container = services.build();
    let server = container.get::<Server>().unwrap();
    assert_eq!(server.port, 9090);

    let record = container.resolve_service(&t("Server")).unwrap();
    assert_eq!(
        record.trace(),
        "Server\n\thost -> \"localhost\" - default\n\tport -> 9090 - parameter Server.port\n"
    );
}

#[test]
fn unconvertible_parameter_values_fail() {
    let mut services = server_collection();
    services.parameters(MapParameters::new().with("port", "eighty"));
    let container = services.build();
    let error = container.get::<Server>().err().unwrap();
    assert!(error.message().starts_with("parameter [port] of service [Server]"));
}

#[test]
fn optional_parameters_bind_to_none() {
    struct Report {
        footer: Option<Arc<String>>,
    }
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Report").with_type::<Report>().constructor(
        Constructor::new(vec![Parameter::service("footer", t("String")).optional()], |args| {
            Ok(Report { footer: args.optional::<String>("footer")? })
        }),
    ));
    let container = services.build();
    let report = container.get::<Report>().unwrap();
    assert!(report.footer.is_none());
    let record = container.resolve_service(&t("Report")).unwrap();
    assert_eq!(record.status(), ServiceStatus::Ok);
    assert_eq!(record.trace(), "Report\n\t!footer - optional\n");
}

#[test]
fn ignored_types_yield_no_instances() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Plugin"));
    services.add_type(
        TypeDef::concrete("Noisy")
            .implements(t("Plugin"))
            .constructor(Constructor::new(vec![], |_| Ok(()))),
    );
    services.configure(t("Noisy"), ServiceConfiguration::new().ignore());
    let container = services.build();
    assert!(container.get_all_services(&t("Plugin")).unwrap().is_empty());
    let record = container.resolve_service(&t("Noisy")).unwrap();
    assert_eq!(record.status(), ServiceStatus::NotResolved);
    assert_eq!(record.comment(), Some("ignored implementation"));
}

#[test]
fn initializers_run_once_per_record() {
    let runs = Arc::new(AtomicUsize::new(0));
    let seen = runs.clone();
    let mut services = ServiceCollection::new();
    services.add_type(
        TypeDef::concrete("Warm")
            .constructor(Constructor::new(vec![], |_| Ok(5u64)))
            .initializer::<u64, _>(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );
    let container = services.build();
    container.get_service(&t("Warm")).unwrap();
    container.get_service(&t("Warm")).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    container.create_service(&t("Warm"), None).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn instance_filter_drops_rejected_instances() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Plugin"));
    for (name, enabled) in [("On", true), ("Off", false)] {
        services.add_type(
            TypeDef::concrete(name)
                .implements(t("Plugin"))
                .constructor(Constructor::new(vec![], move |_| Ok(enabled))),
        );
    }
    services.configure(t("Plugin"), ServiceConfiguration::new().instance_filter::<bool, _>(|on| *on));
    let container = services.build();
    let record = container.resolve_service(&t("Plugin")).unwrap();
    assert_eq!(record.instances().len(), 1);
    assert_eq!(record.comment(), Some("instance filter"));
}

#[test]
fn container_parameter_binds_the_resolving_container() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Host").constructor(Constructor::new(
        vec![Parameter::service("container", t("Container"))],
        |args| Ok(args.get::<Container>("container")?.id()),
    )));
    let container = services.build();
    let id = container.get_as::<u64>(&t("Host")).unwrap();
    assert_eq!(*id, container.id());
    let record = container.resolve_service(&t("Host")).unwrap();
    assert_eq!(record.trace(), "Host\n\tcontainer -> Container\n");
}
