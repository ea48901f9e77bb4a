//! Detection pipeline benchmark over a synthetic 10k-transaction batch.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_mule_detector::{MuleDetector, Transaction};

fn synthetic_batch(transactions: usize, accounts: usize, seed: u64) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    (0..transactions)
        .map(|i| {
            let sender = rng.gen_range(0..accounts);
            let mut receiver = rng.gen_range(0..accounts);
            if receiver == sender {
                receiver = (receiver + 1) % accounts;
            }
            Transaction {
                transaction_id: format!("T{:06}", i),
                sender_id: format!("ACCT-{:04}", sender),
                receiver_id: format!("ACCT-{:04}", receiver),
                amount: rng.gen_range(10.0..25_000.0),
                timestamp: base + Duration::minutes(rng.gen_range(0..43_200)),
            }
        })
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let batch = synthetic_batch(10_000, 800, 42);
    let detector = MuleDetector::new();

    c.bench_function("analyze_10k_transactions", |b| {
        b.iter(|| detector.analyze(black_box(&batch)).unwrap())
    });
}

fn bench_graph_build(c: &mut Criterion) {
    let batch = synthetic_batch(10_000, 800, 42);

    c.bench_function("graph_build_10k", |b| {
        b.iter(|| rust_mule_detector::TransactionGraph::build(black_box(&batch)).unwrap())
    });
}

criterion_group!(benches, bench_analyze, bench_graph_build);
criterion_main!(benches);
