#![no_main]

use ferrous_resolve::{
    Constructor, MapParameters, Parameter, Resolver, ServiceCollection, TypeDef, TypeRef,
};
use libfuzzer_sys::fuzz_target;

const SIMPLE: [&str; 6] = ["u8", "i64", "u16", "bool", "char", "String"];

fuzz_target!(|data: &[u8]| {
    let Some((selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(raw) = std::str::from_utf8(rest) else {
        return;
    };
    let simple = SIMPLE[*selector as usize % SIMPLE.len()];

    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::concrete("Target").constructor(Constructor::from_any(
        vec![Parameter::service("value", TypeRef::named(simple))],
        |args| Ok(args.any("value")?.ok_or("unbound")?),
    )));
    services.parameters(MapParameters::new().with("value", ferrous_resolve::ConfigValue::parse(raw)));
    let container = services.build();

    // Conversion either produces a value or a traced error.
    if let Err(error) = container.get_service(&TypeRef::named("Target")) {
        assert!(error.trace().is_some());
    }
});
