use std::sync::Arc;

use batchred_core::{Ledger, MemoryLedger, SumReducer};
use batchred_prover::SumTranscriptBackend;
use batchred_reducer::{prepare_batches, BatchProver, ReducerOptions, ReductionCoordinator};
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

#[inline]
fn det_values(n: usize, seed: u64) -> Vec<i64> {
    let mut a = 1_664_525u64.wrapping_mul(seed).wrapping_add(1_013_904_223);
    (0..n)
        .map(|_| {
            a = a.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            i64::try_from(a % 1_000_000).unwrap_or(0) + 1
        })
        .collect()
}

fn filled_ledger(values: &[i64]) -> MemoryLedger {
    let l = MemoryLedger::new();
    for v in values {
        l.append(*v).unwrap();
    }
    l
}

fn bench_slice_and_prove(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_prove");
    let n = 4_096usize;
    let values = det_values(n, 2024);
    let ledger = filled_ledger(&values);
    group.throughput(Throughput::Elements(n as u64));

    for &size in &[2u32, 16, 128] {
        group.bench_function(BenchmarkId::new("prepare_batches", size), |b| {
            b.iter(|| black_box(prepare_batches(&ledger, black_box(size)).unwrap()));
        });

        let batches = prepare_batches(&ledger, size).unwrap();
        let prover = BatchProver::<SumTranscriptBackend, _>::new(SumReducer::new());
        for parallel in [false, true] {
            let label = if parallel { "prove_all_par" } else { "prove_all_seq" };
            group.bench_function(BenchmarkId::new(label, size), |b| {
                b.iter(|| black_box(prover.prove_all(&batches, parallel)));
            });
        }
    }
    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_run");
    let n = 1_024usize;
    let values = det_values(n, 7);
    group.throughput(Throughput::Elements(n as u64));

    for &size in &[2u32, 32] {
        group.bench_function(BenchmarkId::new("run", size), |b| {
            b.iter_batched(
                || {
                    ReductionCoordinator::<_, _, SumTranscriptBackend>::new(
                        Arc::new(filled_ledger(&values)),
                        SumReducer::new(),
                        ReducerOptions {
                            batch_size: size,
                            ..ReducerOptions::default()
                        },
                    )
                },
                |coord| black_box(coord.run().unwrap()),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_slice_and_prove, bench_run);
criterion_main!(benches);
