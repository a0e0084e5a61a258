//! Encoding, validation and credit benchmarks.
//!
//! Measures:
//! - Signable encoding and record id computation
//! - Full record validation (two signature checks and a hash)
//! - Chain verification and credit computation over growing histories
//!
//! Run with: `cargo bench -p shareledger-testkit --bench ledger`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use shareledger_core::{validate_share_record, verify_chain, Keypair};
use shareledger_credit::{CreditEngine, CreditParams, MB, MILLIS_PER_DAY};
use shareledger_testkit::fixtures::fan_out_chain;

fn bench_encoding(c: &mut Criterion) {
    let sender = Keypair::from_seed(&[1; 32]);
    let receivers = [Keypair::from_seed(&[2; 32])];
    let record = fan_out_chain(&sender, &receivers, 1, MB as u64, 0, 0).remove(0);

    let mut group = c.benchmark_group("record");
    group.throughput(Throughput::Elements(1));
    group.bench_function("signable_bytes", |b| {
        b.iter(|| black_box(&record.header).signable_bytes().unwrap())
    });
    group.bench_function("compute_id", |b| {
        b.iter(|| black_box(&record).compute_id().unwrap())
    });
    group.bench_function("validate", |b| {
        b.iter(|| validate_share_record(black_box(&record)).unwrap())
    });
    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let sender = Keypair::from_seed(&[1; 32]);
    let receivers: Vec<_> = (2..12u8).map(|s| Keypair::from_seed(&[s; 32])).collect();
    let engine = CreditEngine::new(CreditParams::default()).unwrap();
    let device = sender.public_key();

    let mut group = c.benchmark_group("history");
    for size in [100usize, 1_000, 10_000] {
        let records = fan_out_chain(&sender, &receivers, size, MB as u64, 0, 60_000);
        let now = records.last().map(|r| r.timestamp()).unwrap_or(0) + 30 * MILLIS_PER_DAY;
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("verify_chain", size), &records, |b, records| {
            b.iter(|| verify_chain(&device, black_box(records)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("credit", size), &records, |b, records| {
            b.iter(|| engine.compute(&device, 0, black_box(records), now))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encoding, bench_history);
criterion_main!(benches);
