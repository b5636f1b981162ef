use ferrous_resolve::{
    Constructor, Parameter, Resolver, ServiceCollection, ServiceConfiguration, ServiceFactory,
    TypeDef, TypeRef,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

#[test]
fn two_level_cycle_is_reported_with_both_services() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("A").constructor(Constructor::new(
        vec![Parameter::service("b", t("B"))],
        |_| Ok(()),
    )));
    services.add_type(TypeDef::concrete("B").constructor(Constructor::new(
        vec![Parameter::service("a", t("A"))],
        |_| Ok(()),
    )));
    let container = services.build();

    let error = container.get_service(&t("A")).unwrap_err();
    assert_eq!(
        error.message(),
        "cyclic dependency for service [A], stack\n\tA\n\tB\n\tA"
    );
    assert_eq!(error.trace(), Some("A\n\tB\n\t\t!A <---------------\n"));
}

#[test]
fn self_reference_through_configured_factory() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Selfish"));
    services.configure(
        t("Selfish"),
        ServiceConfiguration::new().factory(|ctx| {
            ctx.get_service(&TypeRef::named("Selfish"))?;
            Ok(())
        }),
    );
    let container = services.build();

    let error = container.get_service(&t("Selfish")).unwrap_err();
    assert!(error.message().starts_with("factory for [Selfish] failed: cyclic dependency"));
}

struct Parent {
    child: Arc<Child>,
}

struct Child {
    parent_factory: ServiceFactory,
}

fn parent_child(eager: bool) -> ServiceCollection {
    let built = Arc::new(AtomicUsize::new(0));
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Parent").with_type::<Parent>().constructor(
        Constructor::new(vec![Parameter::service("child", t("Child"))], move |args| {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Parent { child: args.get::<Child>("child")? })
        }),
    ));
    services.add_type(TypeDef::concrete("Child").with_type::<Child>().constructor(
        Constructor::new(vec![Parameter::factory("parent", t("Parent"))], move |args| {
            let parent_factory = args.value::<ServiceFactory>("parent")?;
            if eager {
                parent_factory.create()?;
            }
            Ok(Child { parent_factory })
        }),
    ));
    services
}

#[test]
fn deferred_factory_breaks_the_cycle() {
    let container = parent_child(false).build();
    let parent = container.get::<Parent>().unwrap();

    let later = parent.child.parent_factory.create_as::<Parent>().unwrap();
    assert!(!Arc::ptr_eq(&parent, &later));
    assert!(Arc::ptr_eq(&parent.child, &later.child));
}

#[test]
fn invoking_the_factory_inside_the_cycle_fails_without_deadlock() {
    let container = parent_child(true).build();
    let error = container.get::<Parent>().err().unwrap();
    assert!(error.message().starts_with("construction of [Child] failed: cyclic dependency"));
    let trace = error.trace().unwrap();
    assert!(trace.starts_with("Parent\n\t!Child <---------------\n"));
    assert!(trace.contains("\t\t!Parent <---------------\n"));
}

#[test]
fn cycle_through_an_abstract_type() {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Port"));
    services.add_type(
        TypeDef::concrete("Adapter")
            .implements(t("Port"))
            .constructor(Constructor::new(vec![Parameter::service("port", t("Port"))], |_| Ok(()))),
    );
    let container = services.build();
    let error = container.get_service(&t("Port")).unwrap_err();
    assert!(error.message().starts_with("cyclic dependency for service [Port]"));
}
