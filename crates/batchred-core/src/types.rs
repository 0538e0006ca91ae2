//! Canonical core types used across the batchred workspace.
//!
//! These live in `batchred-core` and are re-exported at the crate root so other
//! crates can import via `batchred_core::Batch`, `batchred_core::Digest`, etc.
//!
//! The design aims to keep serialized forms conservative and portable (serde).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::chain;

/// Zero-based index of an action in the log.
pub type Position = u64;

/// Value contributed by a producer.
pub type Value = i64;

/// Running fold result (wide enough that summing `i64`s does not overflow in practice).
pub type Aggregate = i128;

/// Fixed-size content-addressed checkpoint of the log up to some position.
///
/// Opaque on purpose: the only operations are equality and [`chain`].
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Borrow the raw digest bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix for logs.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}…)", self.short())
    }
}

/// One producer contribution, immutable once logged.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Action {
    /// Position assigned by the log on append.
    pub position: Position,
    /// Contributed value.
    pub value: Value,
}

impl Action {
    /// Construct a new action.
    #[inline]
    #[must_use]
    pub const fn new(position: Position, value: Value) -> Self {
        Self { position, value }
    }
}

/// A slot of a batch: either a logged action or padding.
///
/// Dummy entries are excluded from the digest chain and contribute nothing to
/// the fold, wherever they sit in the batch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BatchEntry {
    /// A real action taken from the log.
    Real(Action),
    /// Padding up to the batch capacity.
    Dummy,
}

impl BatchEntry {
    /// Whether this entry is padding.
    #[inline]
    #[must_use]
    pub const fn is_dummy(&self) -> bool {
        matches!(self, Self::Dummy)
    }

    /// The carried value, or `0` for padding.
    #[inline]
    #[must_use]
    pub const fn value_or_zero(&self) -> Value {
        match self {
            Self::Real(a) => a.value,
            Self::Dummy => 0,
        }
    }

    /// The carried action, if any.
    #[inline]
    #[must_use]
    pub const fn action(&self) -> Option<&Action> {
        match self {
            Self::Real(a) => Some(a),
            Self::Dummy => None,
        }
    }
}

/// Identity of a batch's position range, used to track pending/committed ranges.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BatchCommitment {
    /// First position covered.
    pub start_position: Position,
    /// One past the last real position covered.
    pub end_position: Position,
    /// Digest the range starts from.
    pub start_digest: Digest,
    /// Digest after the range.
    pub end_digest: Digest,
}

/// Fixed-capacity, ordered window over a contiguous range of log positions.
///
/// **Invariants** (checked by [`Batch::is_well_formed`]):
/// - `entries.len() == batch_size`,
/// - real entries occupy positions `start_position..end_position` in order,
/// - `end_digest == chain(start_digest, real values…)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    /// First log position covered.
    pub start_position: Position,
    /// One past the last real position covered.
    pub end_position: Position,
    /// Digest of the log up to `start_position`.
    pub start_digest: Digest,
    /// Digest of the log up to `end_position`.
    pub end_digest: Digest,
    /// Declared capacity.
    pub batch_size: u32,
    /// Real entries followed by padding.
    pub entries: Vec<BatchEntry>,
}

impl Batch {
    /// Iterator over the real actions in order.
    pub fn real_actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.entries.iter().filter_map(BatchEntry::action)
    }

    /// Number of real entries.
    #[must_use]
    pub fn real_len(&self) -> usize {
        self.real_actions().count()
    }

    /// Number of padding entries.
    #[must_use]
    pub fn dummy_len(&self) -> usize {
        self.entries.len() - self.real_len()
    }

    /// Replay the digest chain from `start_digest` over the real entries.
    #[must_use]
    pub fn replay_digest(&self) -> Digest {
        replay_entries(self.start_digest, &self.entries)
    }

    /// Check the structural invariants listed on the type.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        if self.entries.len() != self.batch_size as usize {
            return false;
        }
        let mut expected = self.start_position;
        for a in self.real_actions() {
            if a.position != expected {
                return false;
            }
            expected = match expected.checked_add(1) {
                Some(n) => n,
                None => return false,
            };
        }
        expected == self.end_position && self.replay_digest() == self.end_digest
    }

    /// Range identity of this batch.
    #[must_use]
    pub const fn commitment(&self) -> BatchCommitment {
        BatchCommitment {
            start_position: self.start_position,
            end_position: self.end_position,
            start_digest: self.start_digest,
            end_digest: self.end_digest,
        }
    }

    /// Public inputs of this batch given the claimed fold `delta`.
    #[must_use]
    pub const fn public_inputs(&self, delta: Aggregate) -> PublicInputs {
        PublicInputs {
            start_digest: self.start_digest,
            end_digest: self.end_digest,
            batch_size: self.batch_size,
            delta,
        }
    }

    /// Borrow the private witness handed to a proving backend.
    #[must_use]
    pub fn witness(&self) -> BatchWitness<'_> {
        BatchWitness {
            entries: &self.entries,
        }
    }
}

/// Chain `start` over the real entries of `entries`, skipping padding.
#[must_use]
pub fn replay_entries(start: Digest, entries: &[BatchEntry]) -> Digest {
    entries
        .iter()
        .filter_map(BatchEntry::action)
        .fold(start, |d, a| chain(&d, a.value))
}

/// Statement a batch proof is bound to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicInputs {
    /// Digest the batch starts from.
    pub start_digest: Digest,
    /// Digest the batch ends at.
    pub end_digest: Digest,
    /// Declared batch capacity.
    pub batch_size: u32,
    /// Fold delta of the real entries.
    pub delta: Aggregate,
}

/// Private inputs for a batch proof.
#[derive(Clone, Copy, Debug)]
pub struct BatchWitness<'a> {
    /// All batch entries, padding included.
    pub entries: &'a [BatchEntry],
}

/// Committed frontier: boundary between folded and unfolded positions,
/// together with the aggregate it produced. The two always change together.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrontierState {
    /// Every position below this has been folded exactly once.
    pub committed_position: Position,
    /// Digest of the log up to `committed_position`.
    pub committed_digest: Digest,
    /// Fold of all real actions below `committed_position`.
    pub aggregate: Aggregate,
}

impl FrontierState {
    /// Frontier of a freshly deployed reducer.
    #[must_use]
    pub fn genesis() -> Self {
        Self {
            committed_position: 0,
            committed_digest: crate::digest::initial_digest(),
            aggregate: 0,
        }
    }
}

/// Lifecycle of a position range.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    /// Dispatched but not yet sliced.
    Pending,
    /// Returned by the slicer.
    Batched,
    /// A proof exists and the range is awaiting `advance`.
    Proved,
    /// Applied to the aggregate (terminal).
    Committed,
    /// Frontier moved past it through a different batch (terminal).
    Stale,
}

impl BatchStatus {
    /// Whether no further transition is possible.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{chain, initial_digest};

    fn batch_of(values: &[Value], batch_size: u32) -> Batch {
        let start = initial_digest();
        let mut d = start;
        let mut entries = Vec::new();
        for (i, v) in values.iter().enumerate() {
            d = chain(&d, *v);
            entries.push(BatchEntry::Real(Action::new(i as u64, *v)));
        }
        entries.resize(batch_size as usize, BatchEntry::Dummy);
        Batch {
            start_position: 0,
            end_position: values.len() as u64,
            start_digest: start,
            end_digest: d,
            batch_size,
            entries,
        }
    }

    #[test]
    fn well_formed_batch_with_padding() {
        let b = batch_of(&[5], 2);
        assert!(b.is_well_formed());
        assert_eq!(b.real_len(), 1);
        assert_eq!(b.dummy_len(), 1);
    }

    #[test]
    fn tampered_value_breaks_well_formedness() {
        let mut b = batch_of(&[1, 2], 2);
        b.entries[1] = BatchEntry::Real(Action::new(1, 3));
        assert!(!b.is_well_formed());
    }

    #[test]
    fn size_mismatch_breaks_well_formedness() {
        let mut b = batch_of(&[1, 2], 2);
        b.batch_size = 3;
        assert!(!b.is_well_formed());
    }

    #[test]
    fn position_overflow_is_not_well_formed() {
        let start = initial_digest();
        let b = Batch {
            start_position: u64::MAX,
            end_position: u64::MAX,
            start_digest: start,
            end_digest: chain(&start, 1),
            batch_size: 1,
            entries: vec![BatchEntry::Real(Action::new(u64::MAX, 1))],
        };
        assert!(!b.is_well_formed());
    }

    #[test]
    fn padding_is_excluded_from_digest() {
        let mut b = batch_of(&[1, 2], 4);
        // Moving padding to the front keeps the chain intact.
        b.entries.rotate_right(2);
        assert_eq!(b.replay_digest(), b.end_digest);
    }

    #[test]
    fn digest_display_is_hex() {
        let d = initial_digest();
        assert_eq!(d.to_string().len(), 64);
        assert!(format!("{d:?}").starts_with("Digest("));
    }
}
