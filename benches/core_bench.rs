//! Benchmarks for topology building, fingerprinting and synthesis.
//!
//! Run with: cargo bench

use aguaform::core::registry::StackRegistry;
use aguaform::core::types::DeploymentRequest;
use aguaform::core::{digest, synth, topology};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn request(role: &str) -> DeploymentRequest {
    DeploymentRequest {
        name: "bench".to_string(),
        provider: "docker".to_string(),
        image: "nginx:latest".to_string(),
        internal_port: 80,
        external_port: 8080,
        role: role.to_string(),
    }
}

fn bench_build(c: &mut Criterion) {
    let reg = StackRegistry::builtin();
    let mut group = c.benchmark_group("topology_build");
    for role in ["api", "worker", "service"] {
        let req = request(role);
        let profile = *reg.resolve(role).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(role), &req, |b, req| {
            b.iter(|| {
                let topo = topology::build(black_box(req), &profile).unwrap();
                black_box(topo);
            });
        });
    }
    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let reg = StackRegistry::builtin();
    let topo = topology::build(&request("api"), reg.resolve("api").unwrap()).unwrap();
    c.bench_function("topology_fingerprint", |b| {
        b.iter(|| black_box(digest::topology_fingerprint(black_box(&topo)).unwrap()));
    });
}

fn bench_render(c: &mut Criterion) {
    let reg = StackRegistry::builtin();
    let topo = topology::build(&request("api"), reg.resolve("api").unwrap()).unwrap();
    c.bench_function("synth_render", |b| {
        b.iter(|| black_box(synth::render(black_box(&topo), "blake3:bench")));
    });
}

fn bench_synthesize(c: &mut Criterion) {
    let reg = StackRegistry::builtin();
    let topo = topology::build(&request("worker"), reg.resolve("worker").unwrap()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    c.bench_function("synthesize_to_disk", |b| {
        b.iter(|| black_box(synth::synthesize(black_box(&topo), dir.path()).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_fingerprint,
    bench_render,
    bench_synthesize
);
criterion_main!(benches);
