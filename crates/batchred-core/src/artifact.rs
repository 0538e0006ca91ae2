//! Batch proof artifacts shared across backends and frontends (CLI, harness).
//!
//! [`BatchProof`] pins the backend identity, the [`PublicInputs`] the proof is
//! bound to, backend-opaque `proof_bytes`, and a free-form `meta` JSON value
//! for lightweight diagnostics.
//!
//! ## Backward/forward compatibility
//! - Do **not** add `#[serde(deny_unknown_fields)]` so newer producers with
//!   extra fields remain readable by older consumers.
//! - Unknown backend names map to [`BackendKind::Unknown`].
//!
//! `meta` is for human/ops diagnostics only; verifiers never read it.

use serde::{Deserialize, Serialize};

use crate::types::PublicInputs;

/// Which backend generated the proof.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Reference BLAKE3 transcript backend.
    Transcript,
    /// Catch-all for newer/unknown backends when deserializing.
    #[serde(other)]
    Unknown,
}

/// Certificate binding a batch's public inputs to a correct fold of its contents.
///
/// **Invariants**
/// - `public` is exactly the statement the backend proved.
/// - `backend` reflects the backend that produced `proof_bytes`; verifiers
///   must reject mismatches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchProof {
    /// Backend that produced the proof.
    pub backend: BackendKind,
    /// Statement the proof is bound to.
    pub public: PublicInputs,
    /// Opaque, backend-specific encoding of the proof.
    pub proof_bytes: Vec<u8>,
    /// Free-form metadata for debugging/observability.
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl BatchProof {
    /// Construct a new [`BatchProof`].
    #[inline]
    #[must_use]
    pub const fn new(
        backend: BackendKind,
        public: PublicInputs,
        proof_bytes: Vec<u8>,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            backend,
            public,
            proof_bytes,
            meta,
        }
    }

    /// Returns the proof bytes.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.proof_bytes
    }

    /// Length of the proof bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.proof_bytes.len()
    }

    /// Whether the proof byte vector is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proof_bytes.is_empty()
    }

    /// Returns the backend kind.
    #[inline]
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{digest_of, initial_digest};
    use serde_json::json;

    fn public() -> PublicInputs {
        PublicInputs {
            start_digest: initial_digest(),
            end_digest: digest_of(&[1, 2]),
            batch_size: 2,
            delta: 3,
        }
    }

    #[test]
    fn serde_roundtrip_json() {
        let proof = BatchProof::new(
            BackendKind::Transcript,
            public(),
            vec![1, 2, 3, 4],
            json!({"k": "v"}),
        );

        let ser = serde_json::to_vec(&proof).expect("serialize");
        let de: BatchProof = serde_json::from_slice(&ser).expect("deserialize");

        assert_eq!(de, proof);
        assert!(de.meta.get("k").is_some());
    }

    #[test]
    fn unknown_backend_is_tolerated() {
        #[derive(Serialize)]
        struct Wire<'a> {
            backend: &'a str,
            public: PublicInputs,
            proof_bytes: &'a [u8],
        }

        let w = Wire {
            backend: "supernova",
            public: public(),
            proof_bytes: &[9, 9, 9],
        };
        let ser = serde_json::to_vec(&w).unwrap();
        let de: BatchProof = serde_json::from_slice(&ser).unwrap();

        assert_eq!(de.backend, BackendKind::Unknown);
        assert_eq!(de.bytes(), &[9, 9, 9]);
        assert_eq!(de.meta, serde_json::Value::Null);
    }
}
