//! Backend abstraction for batch proving and verification.
//!
//! Implementors provide a *stateless* API (associated functions) that take the
//! batch [`PublicInputs`] and its [`BatchWitness`] and either produce a
//! [`BatchProof`] or check one. The proof system itself is opaque to the
//! reducer: anything that can uphold the contract below can be plugged in.
//!
//! ## Contracts implementors should uphold
//! - `prove` must only succeed when the witness's real entries, chained from
//!   `public.start_digest`, reach `public.end_digest`, the witness holds exactly
//!   `public.batch_size` entries, and folding the real entries yields
//!   `public.delta` (padding contributes nothing).
//! - `verify` must reject if `proof.backend` is not the implementing backend,
//!   if `proof.public` differs from the expected statement, or if the proof
//!   bytes fail the backend's validity checks.
//! - Neither function should panic for malformed inputs.

use crate::{BatchProof, BatchWitness, PublicInputs, ReduceResult};

/// Minimal backend API the rest of the system depends on.
///
/// Backends are used as type parameters, e.g.
/// `BatchProver::<TranscriptBackend, _>::new(reducer)`.
pub trait ProvingBackend {
    /// Produce a proof of `public` from `witness`.
    ///
    /// # Errors
    /// Returns [`crate::ReduceError::ProofConstruction`] if the witness does not
    /// satisfy the statement or the backend fails internally.
    fn prove(public: &PublicInputs, witness: &BatchWitness<'_>) -> ReduceResult<BatchProof>;

    /// Check `proof` against the expected statement `public`.
    #[must_use]
    fn verify(proof: &BatchProof, public: &PublicInputs) -> bool;
}
