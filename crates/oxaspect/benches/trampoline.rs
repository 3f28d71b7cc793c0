// Hook trampoline benchmarks for OxAspect
//
// These benchmarks measure the cost a hook adds to a message send:
// - Plain cached dispatch as the baseline
// - One hook at each position
// - Chain length scaling
// - Dispatch through an isolated instance
// - Install/remove churn

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use oxaspect::{Class, Method, Object, Position, Selector, Value, aspect, root_class};
use std::str::FromStr;

fn create_class(name: &str) -> (Class, Selector) {
    let class = Class::new(name, &root_class()).unwrap();
    let selector = Selector::from_str("add:to:").unwrap();
    let method = Method::new(&selector, "q@:qq", |_, _, args| {
        Ok(Value::Int(args[0].as_int().unwrap_or_default() + args[1].as_int().unwrap_or_default()))
    })
    .unwrap();
    class.add_method(method).unwrap();
    (class, selector)
}

/// Baseline: cached dispatch with no hooks.
fn bench_unhooked_dispatch(c: &mut Criterion) {
    let (class, selector) = create_class("BenchPlain");
    let obj = Object::new(&class);
    let args = [Value::Int(2), Value::Int(3)];

    c.bench_function("unhooked_dispatch", |b| {
        b.iter(|| obj.send(black_box(&selector), black_box(&args)).unwrap());
    });
}

/// One no-op hook at each position.
fn bench_single_hook(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_hook");

    for (label, position) in [
        ("before", Position::Before),
        ("instead", Position::Instead),
        ("after", Position::After),
    ] {
        let (class, selector) = create_class(&format!("BenchSingle_{label}"));
        let obj = Object::new(&class);
        let args = [Value::Int(2), Value::Int(3)];
        aspect::hook_class(&class, &selector, position, |call| {
            if call.original_invocation_count() == 0 {
                let _ = call.invoke_original();
            }
            Ok(())
        })
        .unwrap();

        group.bench_function(label, |b| {
            b.iter(|| obj.send(black_box(&selector), black_box(&args)).unwrap());
        });
    }

    group.finish();
}

/// Dispatch cost as the number of Before/After hooks grows.
fn bench_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_length");

    for len in [1usize, 4, 16, 64] {
        let (class, selector) = create_class(&format!("BenchChain_{len}"));
        let obj = Object::new(&class);
        let args = [Value::Int(2), Value::Int(3)];
        for i in 0..len {
            let position = if i % 2 == 0 { Position::Before } else { Position::After };
            aspect::hook_class(&class, &selector, position, |call| {
                black_box(call.argument_count());
                Ok(())
            })
            .unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| obj.send(black_box(&selector), black_box(&args)).unwrap());
        });
    }

    group.finish();
}

/// A hooked instance next to an unhooked one of the same class.
fn bench_isolated_instance(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolated_instance");
    let (class, selector) = create_class("BenchIsolated");
    let plain = Object::new(&class);
    let hooked = Object::new(&class);
    let args = [Value::Int(2), Value::Int(3)];
    hooked.hook(&selector, Position::After, |_| Ok(())).unwrap();

    group.bench_function("plain_sibling", |b| {
        b.iter(|| plain.send(black_box(&selector), black_box(&args)).unwrap());
    });
    group.bench_function("hooked", |b| {
        b.iter(|| hooked.send(black_box(&selector), black_box(&args)).unwrap());
    });

    group.finish();
}

/// Installing and removing one hook, including trampoline swap and restore.
fn bench_install_remove(c: &mut Criterion) {
    let (class, selector) = create_class("BenchChurn");

    c.bench_function("install_remove", |b| {
        b.iter(|| {
            let id = aspect::hook_class(&class, &selector, Position::Before, |_| Ok(())).unwrap();
            aspect::unhook(black_box(id))
        });
    });
}

criterion_group!(
    benches,
    bench_unhooked_dispatch,
    bench_single_hook,
    bench_chain_length,
    bench_isolated_instance,
    bench_install_remove,
);
criterion_main!(benches);
