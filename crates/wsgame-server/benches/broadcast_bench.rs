//! Criterion benchmarks for broadcast fan-out.
//!
//! Measures the cost of queueing one message for every registered connection
//! (snapshot + non-blocking enqueue), which is the work done on a sender's
//! receive loop for each ordinary text frame.
//!
//! Run with:
//! ```bash
//! cargo bench --package wsgame-server --bench broadcast_bench
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_util::sync::CancellationToken;
use wsgame_core::ConnectionId;
use wsgame_server::infrastructure::{BroadcastBus, Connection, ConnectionRegistry, OutboundQueue};

const QUEUE_CAPACITY: usize = 1024;

/// A registry with `n` open connections writing into the void.
fn populated(n: u64) -> (BroadcastBus, Vec<OutboundQueue>) {
    let root = CancellationToken::new();
    let registry = Arc::new(ConnectionRegistry::new());
    let mut queues = Vec::new();
    tokio_test::block_on(async {
        for raw in 1..=n {
            let sink = futures_util::sink::drain().sink_map_err(|e: Infallible| -> WsError { match e {} });
            let (conn, queue) =
                Connection::new(ConnectionId::new(raw), None, Box::pin(sink), QUEUE_CAPACITY, &root);
            registry
                .register(Arc::new(conn))
                .await
                .expect("registry not draining");
            queues.push(queue);
        }
    });
    (BroadcastBus::new(registry), queues)
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_fan_out");

    for n in [1_u64, 16, 128, 1024] {
        let (bus, mut queues) = populated(n);
        group.bench_with_input(BenchmarkId::new("connections", n), &n, |b, _| {
            b.iter(|| {
                let report = tokio_test::block_on(bus.broadcast(black_box("hello")));
                for queue in queues.iter_mut() {
                    let _ = queue.try_recv();
                }
                report
            })
        });
    }

    group.finish();
}

fn bench_overflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_overflow");

    // Every queue is full, so every delivery takes the drop path.
    let (bus, _queues) = populated(128);
    for _ in 0..QUEUE_CAPACITY {
        tokio_test::block_on(bus.broadcast("fill"));
    }
    group.bench_function("connections/128", |b| {
        b.iter(|| tokio_test::block_on(bus.broadcast(black_box("dropped"))))
    });

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_overflow);
criterion_main!(benches);
