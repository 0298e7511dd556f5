//! Resolution benchmark
//!
//! Worst case is a descriptor that matches nothing and walks every rule.

use binder::{Action, Binder, BitList, Protocol, Rule, TrafficDescriptor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn port_rules(count: u32) -> Vec<Rule> {
    (0..count)
        .map(|i| {
            let mut rule = Rule::default();
            rule.when.ports = BitList::from_members("ports", 65535, &[i % 65535]).ok();
            rule.target.action = Action::Allow;
            rule
        })
        .collect()
}

fn resolve_benchmark(c: &mut Criterion) {
    let binder = Binder::new(1);
    binder.load_rules(port_rules(16));
    let worker = binder.worker(0).expect("worker 0");

    let hit = TrafficDescriptor::new(
        "10.0.0.1".parse().unwrap(),
        "10.0.0.2".parse().unwrap(),
        Protocol::Tcp,
        0,
    );
    let mut miss = hit.clone();
    miss.port = 65535;

    let mut group = c.benchmark_group("resolve");
    group.bench_function("first_rule", |b| b.iter(|| worker.resolve(black_box(&hit))));
    group.bench_function("fallback", |b| b.iter(|| worker.resolve(black_box(&miss))));
    group.finish();
}

fn resolve_scaling_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_scaling");

    for size in [10u32, 100, 1000] {
        let binder = Binder::new(1);
        binder.load_rules(port_rules(size));
        let worker = binder.worker(0).expect("worker 0");
        let mut miss = TrafficDescriptor::default();
        miss.port = 65535;

        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &miss, |b, desc| {
            b.iter(|| worker.resolve(black_box(desc)))
        });
    }

    group.finish();
}

criterion_group!(benches, resolve_benchmark, resolve_scaling_benchmark);
criterion_main!(benches);
