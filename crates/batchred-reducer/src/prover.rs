//! Stateless batch proving.
//!
//! [`BatchProver`] computes a batch's fold delta with the reducer and hands the
//! resulting statement plus the entries to the backend. It holds no state
//! beyond the reducer, so proofs can be built in parallel, retried, or thrown
//! away without any cleanup.

use std::marker::PhantomData;

use batchred_core::{Batch, BatchProof, ProvingBackend, ReduceError, ReduceResult, Reducer};
use rayon::prelude::*;
use tracing::debug;

/// Proves batches with backend `B`, folding with reducer `R`.
#[derive(Debug, Clone)]
pub struct BatchProver<B, R> {
    reducer: R,
    backend: PhantomData<fn() -> B>,
}

impl<B: ProvingBackend, R: Reducer> BatchProver<B, R> {
    /// Construct a prover for `reducer`.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            backend: PhantomData,
        }
    }

    /// Prove a single batch.
    ///
    /// # Errors
    /// [`ReduceError::ProofConstruction`] if the batch is not shaped as its
    /// header claims or the backend refuses the statement.
    pub fn prove(&self, batch: &Batch) -> ReduceResult<BatchProof> {
        if batch.entries.len() != batch.batch_size as usize {
            return Err(ReduceError::ProofConstruction(format!(
                "batch at {} holds {} entries, declares {}",
                batch.start_position,
                batch.entries.len(),
                batch.batch_size
            )));
        }
        let delta = self.reducer.delta(&batch.entries);
        let public = batch.public_inputs(delta);
        let proof = B::prove(&public, &batch.witness())?;
        debug!(
            start = batch.start_position,
            end = batch.end_position,
            delta,
            bytes = proof.len(),
            "batch proved"
        );
        Ok(proof)
    }

    /// Prove every batch, in parallel on the rayon pool when `parallel` is set.
    ///
    /// Results keep the order of `batches`.
    pub fn prove_all(&self, batches: &[Batch], parallel: bool) -> Vec<ReduceResult<BatchProof>> {
        if parallel {
            batches.par_iter().map(|b| self.prove(b)).collect()
        } else {
            batches.iter().map(|b| self.prove(b)).collect()
        }
    }
}
