use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;

use glassbil::{EventBus, Frozen, Registry, Store, CHANGED};

fn counter_store() -> Store {
    let store = Store::builder().registry(Registry::new()).name("bench").build();
    store.register("incremented", |state, by, _next| {
        json!(state.as_i64().unwrap_or(0) + by.as_i64().unwrap_or(1))
    });
    store
}

fn frozen_wrap_benchmark(c: &mut Criterion) {
    let tree = json!({
        "todos": (0..100).map(|id| json!({"id": id, "title": "task"})).collect::<Vec<_>>(),
    });

    c.bench_function("frozen_wrap", |b| {
        b.iter(|| Frozen::wrap(black_box(tree.clone())));
    });
}

fn frozen_access_benchmark(c: &mut Criterion) {
    let frozen = Frozen::wrap(json!({
        "todos": (0..100).map(|id| json!({"id": id, "title": "task"})).collect::<Vec<_>>(),
    }));

    c.bench_function("frozen_access", |b| {
        b.iter(|| black_box(frozen.at(black_box("todos.50.title"))));
    });
}

fn dispatch_benchmark(c: &mut Criterion) {
    let store = counter_store();

    c.bench_function("dispatch", |b| {
        b.iter(|| {
            store.dispatch("incremented", black_box(json!(1))).unwrap();
        });
    });
}

fn publish_benchmark(c: &mut Criterion) {
    let bus = EventBus::new();
    bus.subscribe("bench", |_| {});
    let payload = Frozen::wrap(json!([1, 2, 3]));

    c.bench_function("publish", |b| {
        b.iter(|| bus.publish("bench", black_box(payload.clone()), None));
    });
}

fn dispatch_subscribers_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_subscribers");

    for subscriber_count in [1, 10, 100].iter() {
        let store = counter_store();

        for _ in 0..*subscriber_count {
            store.on(CHANGED, |_| {
                // Empty subscriber
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                b.iter(|| {
                    store.dispatch("incremented", black_box(json!(1))).unwrap();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    frozen_wrap_benchmark,
    frozen_access_benchmark,
    dispatch_benchmark,
    publish_benchmark,
    dispatch_subscribers_benchmark,
);
criterion_main!(benches);
