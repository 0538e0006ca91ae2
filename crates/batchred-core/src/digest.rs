// crates/batchred-core/src/digest.rs

//! Incremental digest chain over the action log.
//!
//! `digest(0) = initial_digest()` and `digest(N+1) = chain(digest(N), value_N)`.
//! The chain is a pure function of the log prefix, so any party can name "the
//! log up to position N" by a single 32-byte value. Padding never enters the
//! chain; batches and the log agree on that convention.
//!
//! The encoding below must stay **wire-stable**: digests are persisted in
//! batches, proofs and frontiers.

use blake3::Hasher;

use crate::types::{Digest, Position, Value};

/// Domain separator for the empty-log digest.
const DS_INITIAL: &[u8] = b"batchred/action-log/empty/v1";
/// Domain separator for one chaining step.
const DS_CHAIN: &[u8] = b"batchred/action-log/chain/v1";

/// Digest of the empty log.
#[must_use]
pub fn initial_digest() -> Digest {
    Digest(*blake3::hash(DS_INITIAL).as_bytes())
}

/// Extend `prior` by one action value.
#[inline]
#[must_use]
pub fn chain(prior: &Digest, value: Value) -> Digest {
    let mut h = Hasher::new();
    h.update(DS_CHAIN);
    h.update(prior.as_bytes());
    h.update(&value.to_le_bytes());
    Digest(*h.finalize().as_bytes())
}

/// Running digest of a growing log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DigestChain {
    head: Digest,
    len: Position,
}

impl Default for DigestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestChain {
    /// Chain over the empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: initial_digest(),
            len: 0,
        }
    }

    /// Resume from a known checkpoint.
    #[must_use]
    pub const fn resume(head: Digest, len: Position) -> Self {
        Self { head, len }
    }

    /// Absorb the next value; returns the new head.
    pub fn push(&mut self, value: Value) -> Digest {
        self.head = chain(&self.head, value);
        self.len += 1;
        self.head
    }

    /// Current head.
    #[inline]
    #[must_use]
    pub const fn head(&self) -> Digest {
        self.head
    }

    /// Number of values absorbed (including those before `resume`).
    #[inline]
    #[must_use]
    pub const fn len(&self) -> Position {
        self.len
    }

    /// Whether nothing has been absorbed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Digest of a whole sequence of values starting from the empty log.
#[must_use]
pub fn digest_of(values: &[Value]) -> Digest {
    values.iter().fold(initial_digest(), |d, v| chain(&d, *v))
}
