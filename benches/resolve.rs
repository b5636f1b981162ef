use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_resolve::*;

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

/// `depth` services, each consuming the next one.
fn chain(depth: usize) -> ServiceCollection {
    let mut services = ServiceCollection::new();
    for i in 0..depth {
        let params = if i + 1 < depth {
            vec![Parameter::service("next", t(&format!("Link{}", i + 1)))]
        } else {
            vec![]
        };
        services.add_type(
            TypeDef::concrete(format!("Link{}", i)).constructor(Constructor::new(params, move |_| Ok(i))),
        );
    }
    services
}

fn bench_cached_hit(c: &mut Criterion) {
    let container = chain(1).build();
    let _ = container.get_service(&t("Link0")).unwrap();

    c.bench_function("cached_hit", |b| {
        b.iter(|| black_box(container.get_service(&t("Link0")).unwrap()))
    });
}

fn bench_cold_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_chain");
    for depth in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || chain(depth).build(),
                |container| black_box(container.get_service(&t("Link0")).unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_create_fresh(c: &mut Criterion) {
    let container = chain(5).build();
    c.bench_function("create_fresh_chain_5", |b| {
        b.iter(|| black_box(container.create_service(&t("Link0"), None).unwrap()))
    });
}

fn bench_contract_lookup(c: &mut Criterion) {
    let mut services = chain(3);
    for name in ["eu", "us", "apac"] {
        services.contract(name, |section| {
            section.configure(TypeRef::named("Link2"), ServiceConfiguration::new().comment(name));
        });
    }
    let container = services.build();
    let _ = container.get_service_in(&t("Link0"), &["eu"]).unwrap();

    c.bench_function("contract_cached_hit", |b| {
        b.iter(|| black_box(container.get_service_in(&t("Link0"), &["eu"]).unwrap()))
    });
}

fn handlers(count: usize) -> Container {
    let mut services = ServiceCollection::new();
    services.add_type(TypeDef::interface("Handler"));
    for i in 0..count {
        services.add_type(
            TypeDef::concrete(format!("Handler{}", i))
                .implements(t("Handler"))
                .constructor(Constructor::new(vec![], move |_| Ok(i))),
        );
    }
    services.build()
}

fn bench_abstract_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("abstract_fan_out");
    for count in [2usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || handlers(count),
                |container| black_box(container.get_all_services(&t("Handler")).unwrap().len()),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cached_hit,
    bench_cold_chain,
    bench_create_fresh,
    bench_contract_lookup,
    bench_abstract_fan_out
);
criterion_main!(benches);
