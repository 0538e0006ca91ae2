//! Racing producers and consumers over one ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use batchred_core::{digest_of, Ledger, MemoryLedger, ReduceError, SumReducer};
use batchred_prover::SumTranscriptBackend;
use batchred_reducer::{
    prepare_batches, BatchProver, FrontierTracker, ReducerOptions, ReductionCoordinator,
};

type Coord = ReductionCoordinator<MemoryLedger, SumReducer, SumTranscriptBackend>;
type Tracker = FrontierTracker<MemoryLedger, SumReducer, SumTranscriptBackend>;

const PRODUCERS: i64 = 4;
const PER_PRODUCER: i64 = 50;

#[test]
fn producers_and_consumers_fold_everything_once() {
    let ledger = Arc::new(MemoryLedger::new());
    let consumers: Vec<Coord> = (0..3u32)
        .map(|i| {
            Coord::new(
                Arc::clone(&ledger),
                SumReducer::new(),
                ReducerOptions {
                    batch_size: 2 + i,
                    max_retries: 1_000,
                    parallel_proving: i % 2 == 0,
                },
            )
        })
        .collect();
    let producing = AtomicBool::new(true);

    thread::scope(|s| {
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || {
                    for k in 1..=PER_PRODUCER {
                        let v = p * 1_000 + k;
                        batchred_reducer::dispatch(ledger.as_ref(), &SumReducer::new(), v).unwrap();
                    }
                })
            })
            .collect();

        for c in &consumers {
            let producing = &producing;
            s.spawn(move || {
                while producing.load(Ordering::Acquire) {
                    c.run().unwrap();
                    thread::yield_now();
                }
                c.run().unwrap();
            });
        }

        for p in producers {
            p.join().unwrap();
        }
        producing.store(false, Ordering::Release);
    });

    // One last pass in case every consumer finished its final run early.
    consumers[0].run().unwrap();

    let expected: i128 = (0..PRODUCERS)
        .flat_map(|p| (1..=PER_PRODUCER).map(move |k| i128::from(p * 1_000 + k)))
        .sum();
    let f = ledger.frontier();
    assert_eq!(ledger.len(), (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(f.committed_position, ledger.len());
    assert_eq!(f.committed_digest, ledger.current_digest());
    assert_eq!(f.aggregate, expected);

    let applied: usize = consumers.iter().map(|c| c.tracker().committed_count()).sum();
    assert!(applied > 0);
}

#[test]
fn only_one_advance_of_a_contested_batch_wins() {
    let ledger = Arc::new(MemoryLedger::new());
    for v in [5, 7, 11] {
        ledger.append(v).unwrap();
    }
    let batch = prepare_batches(ledger.as_ref(), 4).unwrap().remove(0);
    let proof = BatchProver::<SumTranscriptBackend, _>::new(SumReducer::new())
        .prove(&batch)
        .unwrap();

    let trackers: Vec<Tracker> = (0..8)
        .map(|_| Tracker::new(Arc::clone(&ledger), SumReducer::new()))
        .collect();

    let (batch, proof) = (&batch, &proof);
    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = trackers
            .iter()
            .map(|t| s.spawn(move || t.advance(batch, proof)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(outcomes.iter().all(|r| match r {
        Ok(_) => true,
        Err(e) => matches!(e, ReduceError::StaleBatch(_) | ReduceError::LedgerConflict(_)),
    }));
    assert_eq!(ledger.frontier().aggregate, 23);
    assert_eq!(ledger.frontier().committed_digest, digest_of(&[5, 7, 11]));
}
