use ferrous_resolve::{
    Constructor, GenericParam, Parameter, Resolver, ServiceCollection, TypeDef, TypeRef,
};

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

fn service_of(arg: TypeRef) -> TypeRef {
    TypeRef::generic("Service", [arg])
}

fn wrapper_collection() -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Service").generic_param(GenericParam::new("T")));
    services.add_type(
        TypeDef::concrete("IntService")
            .implements(service_of(t("i32")))
            .constructor(Constructor::new(vec![], |_| Ok(7i32))),
    );
    services.add_type(TypeDef::concrete("Wrapper").generic_param(GenericParam::new("T")).constructor(
        Constructor::new(vec![Parameter::service("inner", service_of(TypeRef::param(0)))], |args| {
            let inner = args.get::<i32>("inner")?;
            Ok(format!("{}:{}", args.service_type(), inner))
        }),
    ));
    services
}

#[test]
fn closed_generic_resolves_through_its_open_definition() {
    let container = wrapper_collection().build();
    let closed = TypeRef::generic("Wrapper", [t("i32")]);
    let value = container.get_as::<String>(&closed).unwrap();
    assert_eq!(value.as_str(), "Wrapper<i32>:7");

    let record = container.resolve_service(&closed).unwrap();
    assert_eq!(record.trace(), "Wrapper<i32>\n\tService<i32>\n\t\tIntService\n");
}

#[test]
fn closures_are_inferred_from_registered_types() {
    let container = wrapper_collection().build();
    let closures: Vec<String> = container
        .close_generic(&t("Wrapper"))
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(closures, vec!["Wrapper<i32>"]);
    assert!(container.close_generic(&t("IntService")).is_empty());
}

#[test]
fn open_generics_cannot_be_built() {
    let container = wrapper_collection().build();
    let error = container.get_service(&TypeRef::definition("Wrapper", 1)).unwrap_err();
    assert_eq!(error.message(), "can't create open generic [Wrapper<T0>]");

    let error = container.get_service(&t("Wrapper")).unwrap_err();
    assert_eq!(error.message(), "can't create open generic [Wrapper]");
}

fn repo_collection() -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("IEntity"));
    services.add_type(
        TypeDef::concrete("User")
            .implements(t("IEntity"))
            .constructor(Constructor::new(vec![], |_| Ok(()))),
    );
    services.add_type(TypeDef::interface("IRepo").generic_param(GenericParam::new("T")));
    services.add_type(
        TypeDef::concrete("Repo")
            .generic_param(GenericParam::new("T").constraint(t("IEntity")))
            .implements(TypeRef::generic("IRepo", [TypeRef::param(0)]))
            .constructor(Constructor::new(vec![], |args| {
                Ok(format!("repo of {}", args.type_args()[0]))
            })),
    );
    services
}

#[test]
fn generic_implementor_closes_over_requested_abstract() {
    let container = repo_collection().build();
    let repo = container
        .get_as::<String>(&TypeRef::generic("IRepo", [t("User")]))
        .unwrap();
    assert_eq!(repo.as_str(), "repo of User");
}

#[test]
fn non_unifying_generic_implementor_is_reported() {
    let mut services = repo_collection();
    services.add_type(
        TypeDef::concrete("Special")
            .generic_param(GenericParam::new("T"))
            .implements(TypeRef::generic(
                "IRepo",
                [TypeRef::generic("Pair", [TypeRef::param(0)])],
            ))
            .constructor(Constructor::new(vec![], |_| Ok(String::from("special")))),
    );
    let container = services.build();
    let requested = TypeRef::generic("IRepo", [t("User")]);
    assert_eq!(container.get_as::<String>(&requested).unwrap().as_str(), "repo of User");

    let record = container.resolve_service(&requested).unwrap();
    assert_eq!(
        record.trace(),
        "IRepo<User>\n\t!Special<T0> - can't create open generic\n\tRepo<User>\n"
    );
}

#[test]
fn type_arguments_flow_into_parameters() {
    struct Holder {
        value: std::sync::Arc<u64>,
    }
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Counter").constructor(Constructor::new(vec![], |_| Ok(41u64))));
    services.add_type(
        TypeDef::concrete("Holder").generic_param(GenericParam::new("T")).constructor(
            Constructor::new(vec![Parameter::service("value", TypeRef::param(0))], |args| {
                Ok(Holder { value: args.get::<u64>("value")? })
            }),
        ),
    );
    let container = services.build();
    let holder = container
        .get_as::<Holder>(&TypeRef::generic("Holder", [t("Counter")]))
        .unwrap();
    assert_eq!(*holder.value, 41);
}
