//! Frontier tracker: the single point where the aggregate changes.
//!
//! `advance(batch, proof)` applies a batch only if
//! 1. the proof verifies against the statement recomputed from the batch, and
//!    the batch's real entries chain from its start digest to its end digest;
//! 2. the batch starts exactly at the live committed digest;
//! 3. the log still contains the batch's segment (reorg guard);
//! 4. the frontier compare-and-swap in the ledger succeeds, which re-checks
//!    the segment against the log under the ledger's own locks.
//!
//! Steps 1–3 only read. A rejected batch therefore leaves the aggregate, the
//! frontier and the log exactly as they were; step 4 is what makes
//! application at most once across any number of racing consumers.
//!
//! Besides the ledger-held frontier the tracker keeps the commitments it has
//! seen proved (`pending`) and the ones it applied (`committed`), which back
//! [`FrontierTracker::status`].

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use batchred_core::{
    Batch, BatchCommitment, BatchProof, BatchStatus, FrontierState, Ledger, Position,
    ProvingBackend, ReduceError, ReduceResult, Reducer,
};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Commitments {
    pending: HashSet<BatchCommitment>,
    committed: HashSet<BatchCommitment>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guards the committed frontier held by ledger `L`.
#[derive(Debug)]
pub struct FrontierTracker<L: ?Sized, R, B> {
    ledger: Arc<L>,
    reducer: R,
    commitments: Mutex<Commitments>,
    backend: PhantomData<fn() -> B>,
}

impl<L, R, B> FrontierTracker<L, R, B>
where
    L: Ledger + ?Sized,
    R: Reducer,
    B: ProvingBackend,
{
    /// Track the frontier of `ledger`, folding with `reducer`.
    #[must_use]
    pub fn new(ledger: Arc<L>, reducer: R) -> Self {
        Self {
            ledger,
            reducer,
            commitments: Mutex::new(Commitments::default()),
            backend: PhantomData,
        }
    }

    /// The ledger this tracker guards.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Live committed frontier.
    #[must_use]
    pub fn frontier(&self) -> FrontierState {
        self.ledger.frontier()
    }

    /// Register `batch` as proved and awaiting `advance`.
    ///
    /// Batches already committed or superseded are ignored.
    pub fn record_proved(&self, batch: &Batch) {
        if self.status(batch).is_terminal() {
            return;
        }
        let c = batch.commitment();
        let mut g = lock(&self.commitments);
        if !g.committed.contains(&c) {
            g.pending.insert(c);
        }
    }

    /// Apply `batch` if `proof` verifies and the batch starts at the live frontier.
    ///
    /// Returns the new frontier.
    ///
    /// # Errors
    /// - [`ReduceError::ProofVerification`]: the proof or the batch content does
    ///   not match the batch's commitments. Never retry with the same proof.
    /// - [`ReduceError::StaleBatch`]: the frontier is elsewhere, or the batch's
    ///   segment is no longer in the log.
    /// - [`ReduceError::LedgerConflict`]: another consumer won the swap.
    pub fn advance(&self, batch: &Batch, proof: &BatchProof) -> ReduceResult<FrontierState> {
        let delta = self.reducer.delta(&batch.entries);
        let public = batch.public_inputs(delta);
        if !batch.is_well_formed() {
            warn!(start = batch.start_position, "batch content does not match its commitments");
            return Err(ReduceError::ProofVerification(format!(
                "batch {}..{} is not well formed",
                batch.start_position, batch.end_position
            )));
        }
        if !B::verify(proof, &public) {
            warn!(start = batch.start_position, "proof rejected");
            return Err(ReduceError::ProofVerification(format!(
                "proof does not verify for batch {}..{} (delta {delta})",
                batch.start_position, batch.end_position
            )));
        }

        let current = self.ledger.frontier();
        if batch.start_digest != current.committed_digest
            || batch.start_position != current.committed_position
        {
            debug!(
                batch_start = batch.start_position,
                frontier = current.committed_position,
                "stale batch"
            );
            return Err(ReduceError::StaleBatch(format!(
                "batch starts at {} ({}), frontier is at {} ({})",
                batch.start_position,
                batch.start_digest.short(),
                current.committed_position,
                current.committed_digest.short()
            )));
        }

        let commitment = batch.commitment();
        if self.ledger.digest_at(batch.end_position) != Some(batch.end_digest) {
            lock(&self.commitments).pending.remove(&commitment);
            warn!(
                start = batch.start_position,
                end = batch.end_position,
                "batch segment no longer in the log"
            );
            return Err(ReduceError::StaleBatch(format!(
                "log no longer reaches {} at position {}",
                batch.end_digest.short(),
                batch.end_position
            )));
        }

        let next = FrontierState {
            committed_position: batch.end_position,
            committed_digest: batch.end_digest,
            aggregate: self.reducer.merge(current.aggregate, delta),
        };
        if let Err(e) = self.ledger.compare_and_swap_frontier(&current, next) {
            warn!(start = batch.start_position, error = %e, "lost frontier race");
            return Err(e);
        }

        {
            let mut g = lock(&self.commitments);
            g.pending
                .retain(|c| c.start_position >= next.committed_position);
            g.committed.insert(commitment);
        }
        info!(
            from = batch.start_position,
            to = next.committed_position,
            delta,
            aggregate = next.aggregate,
            "batch committed"
        );
        Ok(next)
    }

    /// Lifecycle state of `batch` as seen by this tracker.
    ///
    /// A batch whose range another consumer folded through a different
    /// `advance` reports [`BatchStatus::Stale`].
    #[must_use]
    pub fn status(&self, batch: &Batch) -> BatchStatus {
        let c = batch.commitment();
        let (committed, proved) = {
            let g = lock(&self.commitments);
            (g.committed.contains(&c), g.pending.contains(&c))
        };
        if committed {
            return BatchStatus::Committed;
        }
        let f = self.ledger.frontier();
        let superseded = batch.start_position < f.committed_position
            || (batch.start_position == f.committed_position
                && batch.start_digest != f.committed_digest);
        if superseded || self.ledger.digest_at(batch.end_position) != Some(batch.end_digest) {
            BatchStatus::Stale
        } else if proved {
            BatchStatus::Proved
        } else {
            BatchStatus::Batched
        }
    }

    /// Lifecycle state of a single logged position, `None` if not logged.
    ///
    /// Positions below the frontier are committed; positions covered by a
    /// proved batch are proved; everything else is still pending.
    #[must_use]
    pub fn position_status(&self, position: Position) -> Option<BatchStatus> {
        if position >= self.ledger.len() {
            return None;
        }
        if position < self.ledger.frontier().committed_position {
            return Some(BatchStatus::Committed);
        }
        let proved = lock(&self.commitments)
            .pending
            .iter()
            .any(|c| (c.start_position..c.end_position).contains(&position));
        Some(if proved {
            BatchStatus::Proved
        } else {
            BatchStatus::Pending
        })
    }

    /// Drop pending commitments whose segment reaches beyond `position`.
    ///
    /// Call after the log was reorganised back to length `position`. Returns
    /// how many commitments were dropped.
    pub fn invalidate_from(&self, position: Position) -> usize {
        let mut g = lock(&self.commitments);
        let before = g.pending.len();
        g.pending.retain(|c| c.end_position <= position);
        let dropped = before - g.pending.len();
        if dropped > 0 {
            debug!(position, dropped, "pending commitments invalidated");
        }
        dropped
    }

    /// Proved-but-unapplied commitments, ordered by start position.
    #[must_use]
    pub fn pending(&self) -> Vec<BatchCommitment> {
        let mut v: Vec<_> = lock(&self.commitments).pending.iter().copied().collect();
        v.sort_by_key(|c| (c.start_position, c.end_position));
        v
    }

    /// Number of batches this tracker applied.
    #[must_use]
    pub fn committed_count(&self) -> usize {
        lock(&self.commitments).committed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::BatchProver;
    use crate::slicer::prepare_batches;
    use batchred_core::{MemoryLedger, SumReducer};
    use batchred_prover::SumTranscriptBackend;

    type Tracker = FrontierTracker<MemoryLedger, SumReducer, SumTranscriptBackend>;
    type Prover = BatchProver<SumTranscriptBackend, SumReducer>;

    fn setup(values: &[i64]) -> (Arc<MemoryLedger>, Tracker, Prover) {
        let l = Arc::new(MemoryLedger::new());
        for v in values {
            l.append(*v).unwrap();
        }
        let t = Tracker::new(Arc::clone(&l), SumReducer::new());
        (l, t, Prover::new(SumReducer::new()))
    }

    #[test]
    fn advance_applies_in_order() {
        let (l, t, p) = setup(&[1, 2, 3, 4, 5]);
        for b in prepare_batches(l.as_ref(), 2).unwrap() {
            let proof = p.prove(&b).unwrap();
            t.record_proved(&b);
            assert_eq!(t.status(&b), BatchStatus::Proved);
            t.advance(&b, &proof).unwrap();
            assert_eq!(t.status(&b), BatchStatus::Committed);
        }
        let f = l.frontier();
        assert_eq!(f.aggregate, 15);
        assert_eq!(f.committed_position, 5);
        assert_eq!(f.committed_digest, l.current_digest());
        assert!(t.pending().is_empty());
    }

    #[test]
    fn replayed_advance_is_stale_and_changes_nothing() {
        let (l, t, p) = setup(&[4, 6]);
        let b = prepare_batches(l.as_ref(), 2).unwrap().remove(0);
        let proof = p.prove(&b).unwrap();
        t.advance(&b, &proof).unwrap();
        let after = l.frontier();
        assert!(matches!(
            t.advance(&b, &proof),
            Err(ReduceError::StaleBatch(_))
        ));
        assert_eq!(l.frontier(), after);
        assert_eq!(after.aggregate, 10);
    }

    #[test]
    fn out_of_order_batch_is_stale() {
        let (l, t, p) = setup(&[1, 2, 3]);
        let bs = prepare_batches(l.as_ref(), 2).unwrap();
        let proof = p.prove(&bs[1]).unwrap();
        assert!(matches!(
            t.advance(&bs[1], &proof),
            Err(ReduceError::StaleBatch(_))
        ));
        assert_eq!(l.frontier(), FrontierState::genesis());
        assert_eq!(t.status(&bs[1]), BatchStatus::Batched);
    }

    #[test]
    fn proof_for_other_batch_is_rejected() {
        let (l, t, p) = setup(&[1, 2, 3, 4]);
        let bs = prepare_batches(l.as_ref(), 2).unwrap();
        let wrong = p.prove(&bs[1]).unwrap();
        assert!(matches!(
            t.advance(&bs[0], &wrong),
            Err(ReduceError::ProofVerification(_))
        ));
        assert_eq!(l.frontier(), FrontierState::genesis());
    }

    #[test]
    fn tampered_entries_are_rejected() {
        let (l, t, p) = setup(&[1, 2]);
        let mut b = prepare_batches(l.as_ref(), 2).unwrap().remove(0);
        let proof = p.prove(&b).unwrap();
        b.entries[1] = batchred_core::BatchEntry::Dummy;
        assert!(matches!(
            t.advance(&b, &proof),
            Err(ReduceError::ProofVerification(_))
        ));
        assert_eq!(l.frontier().aggregate, 0);
    }

    #[test]
    fn reorged_segment_is_stale_and_dropped() {
        let (l, t, p) = setup(&[1, 2, 3]);
        let bs = prepare_batches(l.as_ref(), 2).unwrap();
        let first = p.prove(&bs[0]).unwrap();
        t.advance(&bs[0], &first).unwrap();

        let second = p.prove(&bs[1]).unwrap();
        t.record_proved(&bs[1]);
        l.truncate(2).unwrap();
        l.append(30).unwrap();

        assert!(matches!(
            t.advance(&bs[1], &second),
            Err(ReduceError::StaleBatch(_))
        ));
        assert!(t.pending().is_empty());
        assert_eq!(t.status(&bs[1]), BatchStatus::Stale);
        assert_eq!(l.frontier().aggregate, 3);
    }

    #[test]
    fn positions_move_through_the_lifecycle() {
        let (l, t, p) = setup(&[1, 2, 3]);
        assert_eq!(t.position_status(0), Some(BatchStatus::Pending));
        assert_eq!(t.position_status(3), None);

        let b = prepare_batches(l.as_ref(), 2).unwrap().remove(0);
        t.record_proved(&b);
        assert_eq!(t.position_status(1), Some(BatchStatus::Proved));
        assert_eq!(t.position_status(2), Some(BatchStatus::Pending));

        t.advance(&b, &p.prove(&b).unwrap()).unwrap();
        assert_eq!(t.position_status(1), Some(BatchStatus::Committed));
        assert_eq!(t.position_status(2), Some(BatchStatus::Pending));
    }

    #[test]
    fn invalidate_from_drops_reaching_commitments() {
        let (l, t, _) = setup(&[1, 2, 3, 4, 5]);
        let bs = prepare_batches(l.as_ref(), 2).unwrap();
        for b in &bs {
            t.record_proved(b);
        }
        assert_eq!(t.invalidate_from(3), 2);
        assert_eq!(t.pending(), vec![bs[0].commitment()]);
    }

    #[test]
    fn superseded_batch_is_not_recorded() {
        let (l, t, p) = setup(&[1, 2, 3]);
        let wide = prepare_batches(l.as_ref(), 4).unwrap().remove(0);
        let narrow = prepare_batches(l.as_ref(), 2).unwrap().remove(0);
        t.advance(&narrow, &p.prove(&narrow).unwrap()).unwrap();

        t.record_proved(&wide);
        t.record_proved(&narrow);
        assert!(t.pending().is_empty());
        assert_eq!(t.status(&narrow), BatchStatus::Committed);
        assert_eq!(t.position_status(2), Some(BatchStatus::Pending));
    }

    #[test]
    fn commit_prunes_superseded_pending() {
        let (l, t, p) = setup(&[1, 2, 3]);
        // Same start, different slicing: only one of them can ever apply.
        let wide = prepare_batches(l.as_ref(), 4).unwrap().remove(0);
        let narrow = prepare_batches(l.as_ref(), 2).unwrap().remove(0);
        t.record_proved(&wide);
        t.record_proved(&narrow);
        t.advance(&narrow, &p.prove(&narrow).unwrap()).unwrap();
        assert!(t.pending().is_empty());
        assert_eq!(t.status(&wide), BatchStatus::Stale);
        assert_eq!(t.committed_count(), 1);
    }
}
