/// Property-based tests for resolution
///
/// These check behavior that must hold whatever names, chain lengths or contract
/// sets are used.
use ferrous_resolve::{
    Constructor, Parameter, Resolver, ServiceCollection, ServiceConfiguration, TypeDef, TypeRef,
};
use proptest::prelude::*;
use std::sync::Arc;

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

/// `Link0 -> Link1 -> ... -> Link{len-1} -> Link0`
fn ring(len: usize) -> ServiceCollection {
    let mut services = ServiceCollection::new();
    for i in 0..len {
        let next = format!("Link{}", (i + 1) % len);
        services.add_type(TypeDef::concrete(format!("Link{}", i)).constructor(Constructor::new(
            vec![Parameter::service("next", t(&next))],
            |_| Ok(()),
        )));
    }
    services
}

proptest! {
    #[test]
    fn every_ring_is_reported_as_a_cycle(len in 1usize..12) {
        let container = ring(len).build();
        let error = container.get_service(&t("Link0")).unwrap_err();
        prop_assert!(error.message().starts_with("cyclic dependency for service [Link0]"));
        let stack_lines = error.message().lines().count() - 1;
        prop_assert_eq!(stack_lines, len + 1);
        let trace = error.trace().unwrap();
        prop_assert!(trace.ends_with("!Link0 <---------------\n"));
    }
}

proptest! {
    #[test]
    fn unconsumed_contract_chains_collapse_to_the_plain_instance(
        chain in proptest::collection::hash_set("[a-z]{1,6}", 0..5)
    ) {
        let mut services = ServiceCollection::new();
        services.add_type(TypeDef::concrete("Clock").constructor(Constructor::new(vec![], |_| Ok(0u8))));
        let container = services.build();

        let plain = container.get_service(&t("Clock")).unwrap();
        let chain: Vec<&str> = chain.iter().map(String::as_str).collect();
        let scoped = container.get_service_in(&t("Clock"), &chain).unwrap();
        prop_assert!(Arc::ptr_eq(&plain, &scoped));
    }
}

proptest! {
    #[test]
    fn fan_out_preserves_declaration_order(count in 0usize..20) {
        let mut services = ServiceCollection::new();
        services.add_type(TypeDef::interface("Handler"));
        for i in 0..count {
            services.add_type(
                TypeDef::concrete(format!("Handler{}", i))
                    .implements(t("Handler"))
                    .constructor(Constructor::new(vec![], move |_| Ok(i))),
            );
        }
        let container = services.build();
        let values = container.get_all_as::<usize>(&t("Handler")).unwrap();
        let values: Vec<usize> = values.iter().map(|v| **v).collect();
        prop_assert_eq!(values, (0..count).collect::<Vec<_>>());
    }
}

proptest! {
    #[test]
    fn configured_values_reach_the_constructor(value in "\\PC{0,40}", contract in "[a-z]{1,8}") {
        let mut services = ServiceCollection::new();
        services.add_type(TypeDef::concrete("Named").constructor(Constructor::new(
            vec![Parameter::service("name", t("String"))],
            |args| Ok(args.value::<String>("name")?),
        )));
        let configured = value.clone();
        services.contract(&contract, move |c| {
            c.configure(t("Named"), ServiceConfiguration::new().dependency_value("name", configured));
        });
        let container = services.build();
        let resolved = container
            .get_service_in(&t("Named"), &[contract.as_str()])
            .unwrap()
            .downcast::<String>()
            .unwrap();
        prop_assert_eq!(resolved.as_str(), value.as_str());
    }
}
