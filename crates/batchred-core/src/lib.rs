//! batchred-core: core types, digest chain, ledger and proving contracts.
//!
//! This crate defines the **stable boundary** used across batchred crates:
//! - canonical data types (`Action`, `Batch`, `FrontierState`, …),
//! - the incremental digest chain naming "the log up to position N",
//! - the two external collaborators as traits ([`Ledger`], [`ProvingBackend`])
//!   plus the in-memory reference ledger,
//! - the fold domain ([`Reducer`]) and JSON/CBOR I/O for batches and proofs.
//!
//! ```no_run
//! use batchred_core::{Ledger, MemoryLedger};
//! let ledger = MemoryLedger::new();
//! let pos = ledger.append(5)?;
//! assert_eq!(pos, 0);
//! assert_eq!(ledger.len(), 1);
//! # Ok::<(), batchred_core::ReduceError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Proof artifact types (backend kind, public inputs, opaque proof bytes, metadata).
pub mod artifact;
/// Minimal stateless backend trait used by the batch prover.
pub mod backend;
/// Incremental hash chain over action values.
pub mod digest;
/// Error taxonomy shared by every stage of the reduction.
pub mod error;
/// JSON/CBOR helpers for batches and proofs.
pub mod io;
/// Ledger collaborator contract and the in-memory reference ledger.
pub mod ledger;
/// Fold domain: validation, combination and dummy-aware selection.
pub mod reducer;
/// Canonical core data types shared across the workspace.
pub mod types;

// ---- Re-exports for workspace compatibility ----
pub use artifact::*;
pub use backend::*;
pub use digest::*;
pub use error::*;
pub use ledger::*;
pub use reducer::*;
pub use types::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use batchred_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        artifact::BatchProof,
        backend::ProvingBackend,
        error::{ReduceError, ReduceResult},
        ledger::{Ledger, MemoryLedger},
        reducer::{Reducer, SumReducer},
        types::*,
    };
}
