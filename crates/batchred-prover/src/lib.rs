//! Reference proving backend for batch folds.
//!
//! [`TranscriptBackend`] plays the role of the opaque proof system: `prove`
//! replays the witness (digest chain + fold) and refuses to certify anything
//! that does not satisfy the statement; the certificate itself is a transcript
//! MAC under [`DS_BATCH`] that binds `(batch_size, start, end, delta)`.
//!
//! ⚠️ The MAC is keyless, so anyone can mint one for any statement. It stands
//! in for a succinct proof so the reducer can be exercised end to end; the
//! frontier tracker's own well-formedness check (entries chain to the declared
//! end digest) is what ties a statement to concrete log content.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

use std::marker::PhantomData;

use batchred_core::{
    replay_entries, BackendKind, BatchProof, BatchWitness, ProvingBackend, PublicInputs,
    ReduceError, ReduceResult, Reducer, SumReducer,
};
use batchred_crypto::{Blake3Transcript, Label, Transcript};
use tracing::debug;

/// Domain separator binding batch proofs to the transcript.
pub const DS_BATCH: &str = "batchred/batch-proof/v1";

/// Length of the MAC carried in `proof_bytes`.
pub const MAC_LEN: usize = 32;

/// Transcript-MAC backend whose "circuit" folds with reducer `R`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptBackend<R = SumReducer> {
    reducer: PhantomData<R>,
}

/// Backend for the running-sum reducer.
pub type SumTranscriptBackend = TranscriptBackend<SumReducer>;

fn mac(public: &PublicInputs) -> [u8; MAC_LEN] {
    let mut tr = Blake3Transcript::new(DS_BATCH);
    tr.absorb_u64(Label::BatchSize, u64::from(public.batch_size));
    tr.absorb(Label::StartDigest, public.start_digest.as_bytes());
    tr.absorb(Label::EndDigest, public.end_digest.as_bytes());
    tr.absorb_i128(Label::Delta, public.delta);
    tr.challenge_32(Label::Mac)
}

impl<R: Reducer + Default> ProvingBackend for TranscriptBackend<R> {
    fn prove(public: &PublicInputs, witness: &BatchWitness<'_>) -> ReduceResult<BatchProof> {
        // 1) Shape: exactly `batch_size` slots.
        if witness.entries.len() != public.batch_size as usize {
            return Err(ReduceError::ProofConstruction(format!(
                "witness has {} entries, statement declares batch size {}",
                witness.entries.len(),
                public.batch_size
            )));
        }

        // 2) Digest chain: start ⊕ real entries must reach end.
        let replayed = replay_entries(public.start_digest, witness.entries);
        if replayed != public.end_digest {
            return Err(ReduceError::ProofConstruction(format!(
                "entries chained from {} reach {}, not the declared end {}",
                public.start_digest.short(),
                replayed.short(),
                public.end_digest.short()
            )));
        }

        // 3) Fold: padding is neutral, real entries must produce the claimed delta.
        let delta = R::default().delta(witness.entries);
        if delta != public.delta {
            return Err(ReduceError::ProofConstruction(format!(
                "entries fold to {delta}, statement claims {}",
                public.delta
            )));
        }

        let real = witness.entries.iter().filter(|e| !e.is_dummy()).count();
        debug!(
            start = %public.start_digest.short(),
            end = %public.end_digest.short(),
            real,
            "batch proof constructed"
        );

        Ok(BatchProof::new(
            BackendKind::Transcript,
            *public,
            mac(public).to_vec(),
            serde_json::json!({
                "proto": "transcript-v1",
                "real": real,
                "dummies": witness.entries.len() - real,
            }),
        ))
    }

    fn verify(proof: &BatchProof, public: &PublicInputs) -> bool {
        if proof.backend() != BackendKind::Transcript || proof.public != *public {
            return false;
        }
        proof.bytes() == mac(public).as_slice()
    }
}
