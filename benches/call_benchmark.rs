//! Per-call cost of each vault entry point, by payload size.
//!
//! Run with: `cargo bench --bench call_benchmark`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vaultbench::{Vault, DYNAMIC_CAPACITY, FIXED_CAPACITY};

fn vault() -> Vault {
    let mut vault = Vault::init(1, Default::default()).unwrap();
    vault.crypto_init().unwrap();
    vault
}

fn bench_fixed_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_calls");
    let mut vault = vault();

    group.bench_function("noop", |b| b.iter(|| vault.noop()));
    group.bench_function("random_write", |b| {
        b.iter(|| vault.random_fill().unwrap())
    });
    group.bench_function("random_read", |b| {
        b.iter(|| black_box(vault.random_read().unwrap()))
    });

    group.finish();
}

fn bench_copies(c: &mut Criterion) {
    let mut group = c.benchmark_group("copies");
    let mut vault = vault();

    for size in [100usize, FIXED_CAPACITY - 1] {
        let payload = vec![0x41u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("copy_in", size), &size, |b, &size| {
            b.iter(|| black_box(vault.copy_in(black_box(&payload), size)))
        });
        group.bench_with_input(BenchmarkId::new("copy_out", size), &size, |b, &size| {
            b.iter(|| black_box(vault.copy_out(size)))
        });
    }

    for size in [1024usize, DYNAMIC_CAPACITY - 1] {
        let payload = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("alloc_copy_in", size), &size, |b, &size| {
            b.iter(|| black_box(vault.alloc_copy_in(black_box(&payload), size).unwrap()))
        });
        group.bench_with_input(
            BenchmarkId::new("alloc_copy_out", size),
            &size,
            |b, &size| b.iter(|| black_box(vault.alloc_copy_out(size))),
        );
    }

    group.finish();
}

fn bench_crypto(c: &mut Criterion) {
    let mut group = c.benchmark_group("crypto");
    let vault = vault();

    for size in [100usize, 1000, 10_000] {
        let plaintext = vec![0u8; size];
        let frame = vault.encrypt(&plaintext, size).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encrypt", size), &size, |b, &size| {
            b.iter(|| vault.encrypt(black_box(&plaintext), size).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decrypt", size), &size, |b, &size| {
            b.iter(|| vault.decrypt(black_box(&frame), size).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fixed_calls, bench_copies, bench_crypto);
criterion_main!(benches);
