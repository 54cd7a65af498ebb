//! Resolution benchmarks.
//!
//! Measures the hot paths of a warm injector: cached singleton hits,
//! per-call production, lookup chains and multibinding aggregation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use injex::{
    BindingMapBuilder, Injector, MultibindSpec, ProducerDescriptor, TypeId, TypeRegistry, Value,
};
use std::sync::Arc;

fn build(configure: impl FnOnce(&mut BindingMapBuilder)) -> Injector {
    let registry = Arc::new(TypeRegistry::new());
    let mut builder = BindingMapBuilder::new(registry.clone());
    configure(&mut builder);
    Injector::builder(Arc::new(builder.finish()))
        .reflection(registry)
        .build()
        .expect("finished tables are configured")
}

/// Repeated hits on one compiled singleton.
fn bench_cached_singleton(c: &mut Criterion) {
    let injector = build(|builder| {
        builder.bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(8080));
    });
    injector.lookup(&(), (TypeId::INTEGER, "port")).unwrap();

    c.bench_function("lookup_cached_singleton", |b| {
        b.iter(|| {
            injector
                .lookup(black_box(&()), black_box((TypeId::INTEGER, "port")))
                .unwrap()
        })
    });
}

/// Non-caching producer whose value is deep-copied on every call.
fn bench_per_call(c: &mut Criterion) {
    let injector = build(|builder| {
        let config = Value::map([
            ("host", Value::str("localhost")),
            ("port", Value::Int(8080)),
            ("tags", Value::list([Value::str("a"), Value::str("b")])),
        ]);
        builder.bind_named(
            TypeId::MAPPING,
            "config",
            ProducerDescriptor::non_caching(ProducerDescriptor::constant(config)),
        );
    });

    c.bench_function("lookup_per_call_copy", |b| {
        b.iter(|| {
            injector
                .lookup(black_box(&()), black_box((TypeId::MAPPING, "config")))
                .unwrap()
        })
    });
}

/// Live lookup chains of increasing length.
fn bench_lookup_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_chain");

    for depth in [1usize, 4, 16, 64] {
        let injector = build(|builder| {
            builder.bind_named(TypeId::ANY, "k0", ProducerDescriptor::constant(1));
            for n in 1..=depth {
                builder.bind_named(
                    TypeId::ANY,
                    &format!("k{n}"),
                    ProducerDescriptor::non_caching(ProducerDescriptor::lookup(
                        TypeId::ANY,
                        &format!("k{}", n - 1),
                    )),
                );
            }
        });
        let top = format!("k{depth}");
        injector.lookup(&(), (TypeId::ANY, top.as_str())).unwrap();

        group.bench_with_input(BenchmarkId::new("depth", depth), &top, |b, top| {
            b.iter(|| {
                injector
                    .lookup(&(), black_box((TypeId::ANY, top.as_str())))
                    .unwrap()
            })
        });
    }

    group.finish();
}

/// Sequence and mapping aggregation over N contributions.
fn bench_multibind(c: &mut Criterion) {
    let mut group = c.benchmark_group("multibind");

    for count in [4i32, 32, 256] {
        let injector = build(|builder| {
            let items = builder.multibind(TypeId::SEQUENCE, "items", MultibindSpec::default());
            let table = builder.multibind(TypeId::MAPPING, "table", MultibindSpec::default());
            for n in 0..count {
                builder
                    .contribute(
                        items,
                        TypeId::INTEGER,
                        &format!("item{n}"),
                        ProducerDescriptor::constant(n),
                        n,
                    )
                    .unwrap();
                builder
                    .contribute(
                        table,
                        TypeId::TEXT,
                        &format!("entry{n}"),
                        ProducerDescriptor::constant("value"),
                        n,
                    )
                    .unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::new("sequence", count), &count, |b, _| {
            b.iter(|| {
                injector
                    .lookup(&(), black_box((TypeId::SEQUENCE, "items")))
                    .unwrap()
            })
        });
        group.bench_with_input(BenchmarkId::new("mapping", count), &count, |b, _| {
            b.iter(|| {
                injector
                    .lookup(&(), black_box((TypeId::MAPPING, "table")))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cached_singleton,
    bench_per_call,
    bench_lookup_chain,
    bench_multibind
);
criterion_main!(benches);
