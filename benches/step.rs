use criterion::{criterion_group, criterion_main, Criterion};

use driftfield::prelude::*;

fn bench_sequential_step(c: &mut Criterion) {
    let mut sim = ParticleSimulation::new(Backend::Sequential);
    sim.initialize(10_000);
    sim.set_mouse_target(0.0, 0.0, true);

    c.bench_function("sequential_step_10k", |b| {
        b.iter(|| sim.step(1.0 / 60.0));
    });

    let mut drifting = ParticleSimulation::new(Backend::Sequential);
    drifting.initialize(10_000);

    c.bench_function("sequential_step_10k_drift_only", |b| {
        b.iter(|| drifting.step(1.0 / 60.0));
    });
}

criterion_group!(benches, bench_sequential_step);
criterion_main!(benches);
