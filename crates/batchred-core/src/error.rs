//! Error taxonomy for the reduction pipeline.
//!
//! Only [`ReduceError::ProofVerification`] and [`ReduceError::Validation`]
//! are meant to reach users; the coordinator recovers from the others by
//! re-slicing from the live frontier.

use thiserror::Error;

/// Result alias used throughout the batchred crates.
pub type ReduceResult<T> = std::result::Result<T, ReduceError>;

/// Errors surfaced by dispatch, slicing, proving and frontier advancement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// A dispatched value or a configuration value failed its precondition.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The prover could not build a proof for this batch snapshot.
    #[error("proof construction failed: {0}")]
    ProofConstruction(String),

    /// A proof does not satisfy the public inputs of its batch.
    #[error("proof verification failed: {0}")]
    ProofVerification(String),

    /// The frontier moved past this batch (or its source segment vanished).
    #[error("stale batch: {0}")]
    StaleBatch(String),

    /// An optimistic frontier write lost a race.
    #[error("ledger conflict: {0}")]
    LedgerConflict(String),
}

impl ReduceError {
    /// Whether the coordinator may recover by re-slicing and retrying.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProofConstruction(_) | Self::StaleBatch(_) | Self::LedgerConflict(_)
        )
    }

    /// Short stable name, handy for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ProofConstruction(_) => "proof_construction",
            Self::ProofVerification(_) => "proof_verification",
            Self::StaleBatch(_) => "stale_batch",
            Self::LedgerConflict(_) => "ledger_conflict",
        }
    }
}
