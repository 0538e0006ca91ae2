//! Reduction coordinator: slice → prove → advance, retrying on contention.
//!
//! Each round slices the unprocessed suffix from the live frontier, proves the
//! batches (on the rayon pool by default) and advances them in order. The
//! first recoverable failure ends the round; the next round re-slices from
//! wherever the frontier is by then, so already-applied work is never redone.
//!
//! A round after which the frontier has not moved (by this or any other
//! consumer) counts against [`ReducerOptions::max_retries`]; once exhausted
//! the last error is returned.
//! A proof that fails verification is surfaced immediately.

use std::sync::Arc;

use batchred_core::{
    Batch, BatchProof, FrontierState, Ledger, Position, ProvingBackend, ReduceError,
    ReduceResult, Reducer, Value,
};
use tracing::{debug, info, warn};

use crate::api::{ReduceReport, ReducerOptions};
use crate::dispatch::dispatch;
use crate::frontier::FrontierTracker;
use crate::prover::BatchProver;
use crate::slicer::prepare_batches;

/// Drives reduction of a ledger's log into its aggregate.
///
/// `run` takes `&self`, so one coordinator may be shared by several consumer
/// threads, and several coordinators may share one ledger.
#[derive(Debug)]
pub struct ReductionCoordinator<L: ?Sized, R, B> {
    tracker: FrontierTracker<L, R, B>,
    prover: BatchProver<B, R>,
    reducer: R,
    opts: ReducerOptions,
}

enum RoundEnd {
    /// Every sliced batch was applied.
    Drained,
    /// The round stopped early on a recoverable error.
    Interrupted(ReduceError),
}

impl<L, R, B> ReductionCoordinator<L, R, B>
where
    L: Ledger + ?Sized,
    R: Reducer + Clone,
    B: ProvingBackend,
{
    /// Coordinate reduction of `ledger` with `reducer`.
    #[must_use]
    pub fn new(ledger: Arc<L>, reducer: R, opts: ReducerOptions) -> Self {
        Self {
            tracker: FrontierTracker::new(ledger, reducer.clone()),
            prover: BatchProver::new(reducer.clone()),
            reducer,
            opts,
        }
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &ReducerOptions {
        &self.opts
    }

    /// The frontier tracker (for status queries and reorg invalidation).
    #[must_use]
    pub const fn tracker(&self) -> &FrontierTracker<L, R, B> {
        &self.tracker
    }

    /// The batch prover.
    #[must_use]
    pub const fn prover(&self) -> &BatchProver<B, R> {
        &self.prover
    }

    /// Validate and append a producer value.
    ///
    /// # Errors
    /// See [`dispatch`].
    pub fn dispatch(&self, value: Value) -> ReduceResult<Position> {
        dispatch(self.tracker.ledger().as_ref(), &self.reducer, value)
    }

    /// Current committed aggregate.
    #[must_use]
    pub fn aggregate(&self) -> batchred_core::Aggregate {
        self.tracker.frontier().aggregate
    }

    /// Slice the unprocessed suffix with the configured batch size.
    ///
    /// # Errors
    /// See [`prepare_batches`].
    pub fn prepare_batches(&self) -> ReduceResult<Vec<Batch>> {
        prepare_batches(self.tracker.ledger().as_ref(), self.opts.batch_size)
    }

    /// Fold everything logged so far into the aggregate.
    ///
    /// Idempotent: with nothing new in the log this performs one empty round
    /// and changes nothing.
    ///
    /// # Errors
    /// - [`ReduceError::Validation`] for an invalid configuration.
    /// - [`ReduceError::ProofVerification`] as soon as any proof is rejected.
    /// - The last recoverable error once `max_retries` consecutive rounds
    ///   committed nothing.
    pub fn run(&self) -> ReduceResult<ReduceReport> {
        let mut report = ReduceReport::starting_at(self.tracker.frontier());
        let mut unproductive = 0u32;

        loop {
            report.rounds += 1;
            let before = self.tracker.frontier();

            let end = match self.prepare_batches() {
                Ok(batches) if batches.is_empty() => break,
                Ok(batches) => self.round(&batches, &mut report)?,
                Err(e) if e.is_recoverable() => RoundEnd::Interrupted(e),
                Err(e) => return Err(e),
            };

            if let RoundEnd::Interrupted(e) = end {
                // Progress by any consumer resets the budget.
                if self.tracker.frontier() != before {
                    unproductive = 0;
                } else {
                    unproductive += 1;
                    if unproductive > self.opts.max_retries {
                        warn!(rounds = report.rounds, error = %e, "giving up");
                        return Err(e);
                    }
                }
                debug!(round = report.rounds, error = %e, "re-slicing from fresh frontier");
            }
        }

        report.frontier = self.tracker.frontier();
        info!(
            committed = report.committed_batches,
            stale = report.stale_rejections,
            conflicts = report.conflicts,
            rounds = report.rounds,
            position = report.frontier.committed_position,
            aggregate = report.frontier.aggregate,
            "reduction finished"
        );
        Ok(report)
    }

    fn round(&self, batches: &[Batch], report: &mut ReduceReport) -> ReduceResult<RoundEnd> {
        let proofs = self.prover.prove_all(batches, self.opts.parallel_proving);
        for (batch, proof) in batches.iter().zip(proofs) {
            let proof = match proof {
                Ok(p) => p,
                Err(e) if e.is_recoverable() => return Ok(RoundEnd::Interrupted(e)),
                Err(e) => return Err(e),
            };
            if let Err(e) = self.apply(batch, &proof, report) {
                return if e.is_recoverable() {
                    Ok(RoundEnd::Interrupted(e))
                } else {
                    Err(e)
                };
            }
        }
        Ok(RoundEnd::Drained)
    }

    fn apply(
        &self,
        batch: &Batch,
        proof: &BatchProof,
        report: &mut ReduceReport,
    ) -> ReduceResult<FrontierState> {
        self.tracker.record_proved(batch);
        match self.tracker.advance(batch, proof) {
            Ok(f) => {
                report.committed_batches += 1;
                Ok(f)
            }
            Err(e) => {
                match &e {
                    ReduceError::StaleBatch(_) => report.stale_rejections += 1,
                    ReduceError::LedgerConflict(_) => report.conflicts += 1,
                    _ => {}
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchred_core::{MemoryLedger, SumReducer};
    use batchred_prover::SumTranscriptBackend;

    type Coord = ReductionCoordinator<MemoryLedger, SumReducer, SumTranscriptBackend>;

    fn coord(opts: ReducerOptions) -> Coord {
        Coord::new(Arc::new(MemoryLedger::new()), SumReducer::new(), opts)
    }

    #[test]
    fn fresh_deployment_is_zero() {
        let c = coord(ReducerOptions::default());
        assert_eq!(c.aggregate(), 0);
        let r = c.run().unwrap();
        assert_eq!(r.committed_batches, 0);
        assert_eq!(r.rounds, 1);
        assert_eq!(r.frontier, FrontierState::genesis());
    }

    #[test]
    fn reference_scenario() {
        let c = coord(ReducerOptions::default());
        for v in 1..=5 {
            c.dispatch(v).unwrap();
        }
        let r = c.run().unwrap();
        assert_eq!(r.committed_batches, 3);
        assert_eq!(c.aggregate(), 15);

        let again = c.run().unwrap();
        assert_eq!(again.committed_batches, 0);
        assert_eq!(c.aggregate(), 15);

        for v in 1..=5 {
            c.dispatch(v).unwrap();
        }
        c.run().unwrap();
        assert_eq!(c.aggregate(), 30);
    }

    #[test]
    fn sequential_proving_gives_same_result() {
        let c = coord(ReducerOptions {
            batch_size: 3,
            parallel_proving: false,
            ..ReducerOptions::default()
        });
        for v in [10, 20, 30, 40] {
            c.dispatch(v).unwrap();
        }
        let r = c.run().unwrap();
        assert_eq!(r.committed_batches, 2);
        assert_eq!(r.frontier.aggregate, 100);
        assert_eq!(r.frontier.committed_position, 4);
    }

    #[test]
    fn zero_batch_size_is_a_validation_error() {
        let c = coord(ReducerOptions {
            batch_size: 0,
            ..ReducerOptions::default()
        });
        c.dispatch(1).unwrap();
        assert!(matches!(c.run(), Err(ReduceError::Validation(_))));
        assert_eq!(c.aggregate(), 0);
    }

    #[test]
    fn invalid_dispatch_does_not_reach_the_aggregate() {
        let c = coord(ReducerOptions::default());
        assert!(c.dispatch(0).is_err());
        c.dispatch(2).unwrap();
        c.run().unwrap();
        assert_eq!(c.aggregate(), 2);
    }
}
