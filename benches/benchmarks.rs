use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;

use tincan_accessor::{
    dump_state, load_state, make_accessor, payload, Accessor, AccessorConfig, GetterTree,
    MutationTree, Signal,
};

fn counter() -> Accessor {
    make_accessor(
        AccessorConfig::new(|| json!({ "count": 0, "items": [1, 2, 3] }))
            .getters(GetterTree::new().getter("double", |state, _| {
                Ok(json!(state.get_as::<i64>("count")? * 2))
            }))
            .mutations(MutationTree::new().mutation("set", |state, payload| {
                state.set("count", payload.arg(0)?)
            })),
    )
    .unwrap()
}

fn signal_read_benchmark(c: &mut Criterion) {
    let signal: Signal<i32> = Signal::new(42);

    c.bench_function("signal_read", |b| {
        b.iter(|| {
            black_box(signal.get());
        });
    });
}

fn accessor_creation_benchmark(c: &mut Criterion) {
    c.bench_function("accessor_creation", |b| {
        b.iter(|| black_box(counter()));
    });
}

fn field_read_benchmark(c: &mut Criterion) {
    let accessor = counter();

    c.bench_function("field_read", |b| {
        b.iter(|| {
            black_box(accessor.get("count").unwrap());
        });
    });
}

fn cached_getter_benchmark(c: &mut Criterion) {
    let accessor = counter();

    c.bench_function("cached_getter", |b| {
        b.iter(|| {
            black_box(accessor.get("double").unwrap());
        });
    });
}

fn commit_benchmark(c: &mut Criterion) {
    let accessor = counter();

    c.bench_function("commit_then_getter", |b| {
        let mut i = 0;
        b.iter(|| {
            accessor.commit("set", payload![black_box(i)]).unwrap();
            black_box(accessor.get("double").unwrap());
            i += 1;
        });
    });
}

fn snapshot_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump_load");

    for field_count in [1usize, 10, 100].iter() {
        let accessor = make_accessor(AccessorConfig::new({
            let field_count = *field_count;
            move || {
                let fields = (0..field_count)
                    .map(|i| (format!("field{i}"), json!(i)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(fields)
            }
        }))
        .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(field_count),
            field_count,
            |b, _| {
                b.iter(|| {
                    let dump = dump_state(&accessor);
                    load_state(&accessor, black_box(&dump)).unwrap();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    signal_read_benchmark,
    accessor_creation_benchmark,
    field_read_benchmark,
    cached_getter_benchmark,
    commit_benchmark,
    snapshot_benchmark,
);
criterion_main!(benches);
