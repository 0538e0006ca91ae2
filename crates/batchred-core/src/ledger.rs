//! Ledger collaborator contract and the in-memory reference ledger.
//!
//! The ledger owns two things: the append-only action log (with its running
//! digest) and the committed [`FrontierState`]. The log only ever grows through
//! [`Ledger::append`]; the frontier only changes through
//! [`Ledger::compare_and_swap_frontier`], which is the optimistic-concurrency
//! primitive the frontier tracker builds exactly-once application on.
//!
//! ## Synchronization
//! [`MemoryLedger`] keeps the log and the frontier behind two mutexes. Appends
//! take only the log lock. Frontier swaps and [`MemoryLedger::truncate`] take
//! the frontier lock first and the log lock second, so a swap always sees the
//! log it is committing against.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::digest::initial_digest;
use crate::{Action, Digest, FrontierState, Position, ReduceError, ReduceResult, Value};

/// Storage/ordering collaborator the reducer runs on top of.
///
/// Implementations must make `append` atomic with respect to the position
/// counter and the digest, and `compare_and_swap_frontier` atomic with respect
/// to other frontier swaps and to any reorganisation of the log.
pub trait Ledger: Send + Sync {
    /// Append `value` at the next position and advance the running digest.
    fn append(&self, value: Value) -> ReduceResult<Position>;

    /// Number of logged actions.
    fn len(&self) -> Position;

    /// Whether the log is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Actions at positions `lo..hi`, in order.
    ///
    /// # Errors
    /// [`ReduceError::LedgerConflict`] if the range is not (or no longer) present.
    fn read_range(&self, lo: Position, hi: Position) -> ReduceResult<Vec<Action>>;

    /// Digest of the whole log.
    fn current_digest(&self) -> Digest;

    /// Digest of the log prefix of length `position`, if the log is that long.
    fn digest_at(&self, position: Position) -> Option<Digest>;

    /// Current committed frontier.
    fn frontier(&self) -> FrontierState;

    /// Replace the frontier with `new` iff it still equals `expected` and the
    /// log still has `new.committed_digest` at `new.committed_position`.
    ///
    /// # Errors
    /// [`ReduceError::LedgerConflict`] if `expected` is stale or the log no
    /// longer reaches `new`.
    fn compare_and_swap_frontier(
        &self,
        expected: &FrontierState,
        new: FrontierState,
    ) -> ReduceResult<()>;
}

#[derive(Debug)]
struct LogInner {
    actions: Vec<Action>,
    /// `digests[n]` is the digest of the first `n` actions (`digests[0]` is initial).
    digests: Vec<Digest>,
}

/// In-memory [`Ledger`] used by tests, the CLI and the bench harness.
#[derive(Debug)]
pub struct MemoryLedger {
    log: Mutex<LogInner>,
    frontier: Mutex<FrontierState>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every mutation is a single push/truncate/assignment, so poisoned data is still consistent.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryLedger {
    /// Empty log, genesis frontier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Mutex::new(LogInner {
                actions: Vec::new(),
                digests: vec![initial_digest()],
            }),
            frontier: Mutex::new(FrontierState::genesis()),
        }
    }

    /// Drop every action at or beyond `len`, modelling a ledger reorganisation
    /// of appended-but-unconfirmed positions.
    ///
    /// # Errors
    /// [`ReduceError::LedgerConflict`] if `len` is below the committed frontier
    /// (committed positions are final).
    pub fn truncate(&self, len: Position) -> ReduceResult<()> {
        let frontier = lock(&self.frontier);
        if len < frontier.committed_position {
            return Err(ReduceError::LedgerConflict(format!(
                "cannot revert to {len}: positions below {} are committed",
                frontier.committed_position
            )));
        }
        let mut log = lock(&self.log);
        let keep = usize::try_from(len).unwrap_or(usize::MAX);
        if keep < log.actions.len() {
            debug!(from = log.actions.len(), to = keep, "ledger reorganised");
            log.actions.truncate(keep);
            log.digests.truncate(keep + 1);
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn append(&self, value: Value) -> ReduceResult<Position> {
        let mut log = lock(&self.log);
        let position = log.actions.len() as Position;
        let next = crate::digest::chain(&log.digests[log.actions.len()], value);
        log.actions.push(Action::new(position, value));
        log.digests.push(next);
        Ok(position)
    }

    fn len(&self) -> Position {
        lock(&self.log).actions.len() as Position
    }

    fn read_range(&self, lo: Position, hi: Position) -> ReduceResult<Vec<Action>> {
        let log = lock(&self.log);
        let n = log.actions.len() as Position;
        if lo > hi || hi > n {
            return Err(ReduceError::LedgerConflict(format!(
                "range {lo}..{hi} not present in log of length {n}"
            )));
        }
        // Both bounds are ≤ actions.len(), so they fit in usize.
        Ok(log.actions[lo as usize..hi as usize].to_vec())
    }

    fn current_digest(&self) -> Digest {
        let log = lock(&self.log);
        log.digests[log.actions.len()]
    }

    fn digest_at(&self, position: Position) -> Option<Digest> {
        let log = lock(&self.log);
        usize::try_from(position)
            .ok()
            .and_then(|p| log.digests.get(p).copied())
    }

    fn frontier(&self) -> FrontierState {
        *lock(&self.frontier)
    }

    fn compare_and_swap_frontier(
        &self,
        expected: &FrontierState,
        new: FrontierState,
    ) -> ReduceResult<()> {
        let mut cur = lock(&self.frontier);
        if *cur != *expected {
            debug!(
                expected = %expected.committed_digest.short(),
                actual = %cur.committed_digest.short(),
                "frontier swap lost the race"
            );
            return Err(ReduceError::LedgerConflict(format!(
                "frontier is at position {}, expected {}",
                cur.committed_position, expected.committed_position
            )));
        }
        let log = lock(&self.log);
        let reaches = usize::try_from(new.committed_position)
            .ok()
            .and_then(|p| log.digests.get(p))
            == Some(&new.committed_digest);
        if !reaches {
            debug!(
                position = new.committed_position,
                len = log.actions.len(),
                "frontier swap past the live log"
            );
            return Err(ReduceError::LedgerConflict(format!(
                "log of length {} does not reach {} at position {}",
                log.actions.len(),
                new.committed_digest.short(),
                new.committed_position
            )));
        }
        drop(log);
        *cur = new;
        Ok(())
    }
}
