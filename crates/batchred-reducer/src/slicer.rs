//! Batch slicing policy.
//!
//! The unprocessed suffix `[committed_position, log_len)` is cut into
//! consecutive windows of exactly `batch_size` entries. Only the last window
//! can be short; it is padded with [`BatchEntry::Dummy`]. Each batch carries
//! the digest it starts from and the digest its real entries chain to, so the
//! batches of one slice link up end to start.
//!
//! Slicing never mutates anything. Two calls over the same log and frontier
//! return identical batches.

use batchred_core::{
    Action, Batch, BatchEntry, DigestChain, FrontierState, Ledger, ReduceError, ReduceResult,
};
use tracing::debug;

/// Slice the ledger's unprocessed suffix against its live frontier.
///
/// # Errors
/// - [`ReduceError::Validation`] if `batch_size == 0`.
/// - [`ReduceError::LedgerConflict`] if the log shrank underneath the read.
pub fn prepare_batches<L: Ledger + ?Sized>(ledger: &L, batch_size: u32) -> ReduceResult<Vec<Batch>> {
    check_batch_size(batch_size)?;
    let frontier = ledger.frontier();
    let hi = ledger.len();
    if hi <= frontier.committed_position {
        return Ok(Vec::new());
    }
    let suffix = ledger.read_range(frontier.committed_position, hi)?;
    slice_actions(&frontier, &suffix, batch_size)
}

/// Slice `suffix` (the actions starting at `frontier.committed_position`).
///
/// # Errors
/// - [`ReduceError::Validation`] if `batch_size == 0`.
/// - [`ReduceError::LedgerConflict`] if `suffix` does not start at the
///   frontier or has a gap.
pub fn slice_actions(
    frontier: &FrontierState,
    suffix: &[Action],
    batch_size: u32,
) -> ReduceResult<Vec<Batch>> {
    check_batch_size(batch_size)?;
    let cap = batch_size as usize;

    let mut out = Vec::with_capacity(suffix.len().div_ceil(cap));
    let mut log = DigestChain::resume(frontier.committed_digest, frontier.committed_position);

    for window in suffix.chunks(cap) {
        let start_position = log.len();
        let start_digest = log.head();
        let mut entries = Vec::with_capacity(cap);
        for a in window {
            if a.position != log.len() {
                return Err(ReduceError::LedgerConflict(format!(
                    "expected action at position {}, found {}",
                    log.len(),
                    a.position
                )));
            }
            log.push(a.value);
            entries.push(BatchEntry::Real(*a));
        }
        entries.resize(cap, BatchEntry::Dummy);

        out.push(Batch {
            start_position,
            end_position: log.len(),
            start_digest,
            end_digest: log.head(),
            batch_size,
            entries,
        });
    }

    debug!(
        from = frontier.committed_position,
        to = log.len(),
        batches = out.len(),
        batch_size,
        "sliced"
    );
    Ok(out)
}

fn check_batch_size(batch_size: u32) -> ReduceResult<()> {
    if batch_size == 0 {
        return Err(ReduceError::Validation(
            "batch size must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchred_core::{MemoryLedger, Value};

    fn ledger_with(values: &[Value]) -> MemoryLedger {
        let l = MemoryLedger::new();
        for v in values {
            l.append(*v).unwrap();
        }
        l
    }

    fn values(b: &Batch) -> Vec<Option<Value>> {
        b.entries
            .iter()
            .map(|e| e.action().map(|a| a.value))
            .collect()
    }

    #[test]
    fn five_actions_in_pairs() {
        let l = ledger_with(&[1, 2, 3, 4, 5]);
        let batches = prepare_batches(&l, 2).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(values(&batches[0]), vec![Some(1), Some(2)]);
        assert_eq!(values(&batches[1]), vec![Some(3), Some(4)]);
        assert_eq!(values(&batches[2]), vec![Some(5), None]);
        assert_eq!(batches[2].end_position, 5);
        assert_eq!(batches[2].end_digest, l.current_digest());
    }

    #[test]
    fn consecutive_batches_link_up() {
        let l = ledger_with(&[7, 1, 8, 2, 8, 1, 8]);
        let batches = prepare_batches(&l, 3).unwrap();
        assert_eq!(batches[0].start_digest, l.frontier().committed_digest);
        for pair in batches.windows(2) {
            assert_eq!(pair[0].end_digest, pair[1].start_digest);
            assert_eq!(pair[0].end_position, pair[1].start_position);
        }
        assert!(batches.iter().all(Batch::is_well_formed));
    }

    #[test]
    fn empty_suffix_gives_nothing() {
        let l = MemoryLedger::new();
        assert!(prepare_batches(&l, 4).unwrap().is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let l = ledger_with(&[1]);
        assert!(matches!(
            prepare_batches(&l, 0),
            Err(ReduceError::Validation(_))
        ));
    }

    #[test]
    fn slicing_is_deterministic_and_read_only() {
        let l = ledger_with(&[3, 1, 4, 1, 5, 9, 2, 6]);
        let before = (l.len(), l.current_digest(), l.frontier());
        let a = prepare_batches(&l, 3).unwrap();
        let b = prepare_batches(&l, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(before, (l.len(), l.current_digest(), l.frontier()));
    }

    #[test]
    fn gaps_are_reported() {
        let f = FrontierState::genesis();
        let suffix = [Action::new(0, 1), Action::new(2, 1)];
        assert!(matches!(
            slice_actions(&f, &suffix, 4),
            Err(ReduceError::LedgerConflict(_))
        ));
    }
}
