use std::time::Duration;

use circuit_guard::{BreakerClient, CircuitBreakerConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new(5, Duration::from_secs(1), Duration::from_secs(30)).unwrap()
}

fn benchmark_closed_submit(c: &mut Criterion) {
    let rt = runtime();
    let client = rt.block_on(async { BreakerClient::<u64, String>::spawn("bench_closed", config()) });

    c.bench_function("closed_submit", |b| {
        b.iter(|| rt.block_on(client.submit(|| async { Ok(black_box(7)) })))
    });
}

fn benchmark_open_short_circuit(c: &mut Criterion) {
    let rt = runtime();
    let client = rt.block_on(async {
        let client = BreakerClient::<u64, String>::spawn("bench_open", config());
        client.breaker().force_open().await.unwrap();
        client
    });

    c.bench_function("open_fallback", |b| {
        b.iter(|| rt.block_on(client.submit_with_fallback(|| async { Ok(1) }, black_box(0))))
    });
}

criterion_group!(benches, benchmark_closed_submit, benchmark_open_short_circuit);
criterion_main!(benches);
