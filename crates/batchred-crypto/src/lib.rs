// crates/batchred-crypto/src/lib.rs

//! Minimal crypto substrate: Blake3 transcript with a simple absorb/challenge API.
//!
//! ⚠️ **Security note:** the transcript models a domain-separated random oracle
//! using Blake3. It is what the reference proof backend binds batch public
//! inputs with; it is **not** a zero-knowledge proof system.

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

use blake3::Hasher;

/// Fixed domain prefix to seed transcripts.
const TRANSCRIPT_PREFIX: &[u8] = b"batchred.transcript.v1";

/// Transcript interface used by proof backends.
///
/// Implementations should apply domain separation for both absorbs and challenges.
pub trait Transcript {
    /// Add raw bytes under a label (domain-separated).
    fn absorb(&mut self, label: Label, bytes: &[u8]);

    /// Convenience: absorb an unsigned 64-bit value (LE).
    fn absorb_u64(&mut self, label: Label, x: u64) {
        self.absorb(label, &x.to_le_bytes());
    }

    /// Convenience: absorb a signed 128-bit value (two's-complement LE).
    fn absorb_i128(&mut self, label: Label, x: i128) {
        self.absorb(label, &x.to_le_bytes());
    }

    /// Squeeze `n` bytes as a challenge under `label`.
    ///
    /// Implementations should be deterministic with respect to the transcript state.
    #[must_use]
    fn challenge_bytes(&mut self, label: Label, n: usize) -> Vec<u8>;

    /// Squeeze a 32-byte challenge (the common MAC width).
    #[must_use]
    fn challenge_32(&mut self, label: Label) -> [u8; 32] {
        let v = self.challenge_bytes(label, 32);
        let mut out = [0u8; 32];
        out.copy_from_slice(&v);
        out
    }
}

/// Blake3-based transcript.
#[derive(Clone, Debug)]
pub struct Blake3Transcript {
    st: Hasher,
}

impl Blake3Transcript {
    /// Create a new transcript with a domain separation prefix.
    #[must_use]
    pub fn new(domain_sep: &str) -> Self {
        let mut st = Hasher::new();
        st.update(TRANSCRIPT_PREFIX);
        st.update(&(domain_sep.len() as u32).to_le_bytes());
        st.update(domain_sep.as_bytes());
        Self { st }
    }
}

impl Transcript for Blake3Transcript {
    fn absorb(&mut self, label: Label, bytes: &[u8]) {
        // tag "absorb", label length+bytes, payload length+bytes.
        let label = label.as_str();
        self.st.update(b"absorb");
        self.st.update(&(label.len() as u32).to_le_bytes());
        self.st.update(label.as_bytes());
        self.st.update(&(bytes.len() as u64).to_le_bytes());
        self.st.update(bytes);
    }

    fn challenge_bytes(&mut self, label: Label, n: usize) -> Vec<u8> {
        let label = label.as_str();
        let mut st = self.st.clone();
        st.update(b"challenge");
        st.update(&(label.len() as u32).to_le_bytes());
        st.update(label.as_bytes());

        let mut out = vec![0u8; n];
        st.finalize_xof().fill(&mut out);

        // Model transcript "forward progress" after a challenge.
        self.st.update(b"after_challenge");
        self.st.update(&(label.len() as u32).to_le_bytes());
        self.st.update(label.as_bytes());

        out
    }
}

/// Canonical transcript labels used by batch proofs.
/// Avoids stringly-typed mistakes in domain separation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Label {
    /// Declared batch capacity.
    BatchSize,
    /// Digest the batch starts from.
    StartDigest,
    /// Digest the batch claims to end at.
    EndDigest,
    /// Claimed fold delta of the real entries.
    Delta,
    /// Final MAC squeeze.
    Mac,
}

impl Label {
    /// Borrow the canonical string.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BatchSize => "batchred/batch_size",
            Self::StartDigest => "batchred/start_digest",
            Self::EndDigest => "batchred/end_digest",
            Self::Delta => "batchred/delta",
            Self::Mac => "batchred/mac",
        }
    }
}
