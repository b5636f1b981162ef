#![no_main]

use ferrous_resolve::{
    Constructor, Parameter, Resolver, ServiceCollection, ServiceConfiguration, TypeDef, TypeRef,
};
use libfuzzer_sys::fuzz_target;

const CONTRACTS: [&str; 4] = ["a", "B", "c", "all"];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Leaf").constructor(Constructor::new(
        vec![Parameter::service("name", TypeRef::named("String"))],
        |args| Ok(args.value::<String>("name")?),
    )));
    services.add_type(TypeDef::concrete("Root").constructor(Constructor::new(
        vec![Parameter::all("leaves", TypeRef::named("Leaf"))],
        |_| Ok(()),
    )));
    for name in &CONTRACTS[..3] {
        if data[0] & (1 << (name.len() % 3)) != 0 {
            services.contract(name, |c| {
                c.configure(
                    TypeRef::named("Leaf"),
                    ServiceConfiguration::new().dependency_value("name", name.to_string()),
                );
            });
        }
    }
    services.union_contract("all", ["a", "c"]);
    let container = services.build();

    // Any chain of known or unknown contracts must resolve or fail, never panic.
    let chain: Vec<&str> = data[1..]
        .iter()
        .take(6)
        .map(|b| CONTRACTS[*b as usize % CONTRACTS.len()])
        .collect();
    let root = container.get_service_in(&TypeRef::named("Root"), &chain);
    let leaf = container.get_all_services_in(&TypeRef::named("Leaf"), &chain);
    if let (Err(root), Err(leaf)) = (root, leaf) {
        assert!(!root.message().is_empty());
        assert!(!leaf.message().is_empty());
    }
});
