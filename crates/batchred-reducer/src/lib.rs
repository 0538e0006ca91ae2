//! Batched, proof-verified, exactly-once reduction.
//!
//! This crate ties together:
//! - [`dispatch`]: validated append of producer values,
//! - [`prepare_batches`]: the pure slicing policy over the unprocessed suffix,
//! - [`BatchProver`]: stateless proof construction per batch,
//! - [`FrontierTracker`]: the compare-and-swap guarded `advance`,
//! - [`ReductionCoordinator`]: the slice → prove → advance retry loop.
//!
//! ```no_run
//! use std::sync::Arc;
//! use batchred_core::{MemoryLedger, SumReducer};
//! use batchred_prover::SumTranscriptBackend;
//! use batchred_reducer::{ReducerOptions, ReductionCoordinator};
//!
//! let ledger = Arc::new(MemoryLedger::new());
//! let coord = ReductionCoordinator::<_, _, SumTranscriptBackend>::new(
//!     ledger,
//!     SumReducer::new(),
//!     ReducerOptions::default(),
//! );
//! for v in 1..=5 {
//!     coord.dispatch(v)?;
//! }
//! let report = coord.run()?;
//! assert_eq!(report.frontier.aggregate, 15);
//! # Ok::<(), batchred_core::ReduceError>(())
//! ```

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
#![allow(clippy::module_name_repetitions)]

/// Options and run report.
pub mod api;
/// Slice → prove → advance loop.
pub mod coordinator;
/// Validated append.
pub mod dispatch;
/// Frontier tracker: pending commitments and guarded `advance`.
pub mod frontier;
/// Stateless batch proving shim over a [`batchred_core::ProvingBackend`].
pub mod prover;
/// Batch slicing policy.
pub mod slicer;

pub use crate::api::{ReduceReport, ReducerOptions};
pub use crate::coordinator::ReductionCoordinator;
pub use crate::dispatch::dispatch;
pub use crate::frontier::FrontierTracker;
pub use crate::prover::BatchProver;
pub use crate::slicer::{prepare_batches, slice_actions};
