//! Options and the per-run report.
//!
//! [`ReducerOptions`] are hints to the coordinator; the slicer and tracker
//! only ever see the batch size.

use batchred_core::FrontierState;
use serde::{Deserialize, Serialize};

/// Batch capacity used when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 2;
/// Consecutive unproductive rounds tolerated before a run gives up.
pub const DEFAULT_MAX_RETRIES: u32 = 16;

/// Coordinator options.
///
/// Deserializes from partial TOML/JSON; missing fields take their defaults.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReducerOptions {
    /// Entries per batch (real plus padding). Must be non-zero.
    pub batch_size: u32,
    /// Consecutive rounds without a committed batch before the last
    /// recoverable error is surfaced.
    pub max_retries: u32,
    /// Prove a round's batches on the rayon pool instead of sequentially.
    pub parallel_proving: bool,
}

impl Default for ReducerOptions {
    #[inline]
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            parallel_proving: true,
        }
    }
}

impl ReducerOptions {
    /// Defaults merged with environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `BATCHRED_BATCH_SIZE`, `BATCHRED_MAX_RETRIES` and
    /// `BATCHRED_PARALLEL` on top of `self`. Unparsable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(s) = std::env::var("BATCHRED_BATCH_SIZE") {
            if let Ok(v) = s.trim().parse::<u32>() {
                self.batch_size = v;
            }
        }
        if let Ok(s) = std::env::var("BATCHRED_MAX_RETRIES") {
            if let Ok(v) = s.trim().parse::<u32>() {
                self.max_retries = v;
            }
        }
        if let Ok(s) = std::env::var("BATCHRED_PARALLEL") {
            if let Some(v) = parse_flag(&s) {
                self.parallel_proving = v;
            }
        }
        self
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Outcome of one [`crate::ReductionCoordinator::run`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReduceReport {
    /// Batches this run applied to the aggregate.
    pub committed_batches: u64,
    /// `advance` calls rejected because the frontier had moved.
    pub stale_rejections: u64,
    /// `advance` calls that lost the frontier compare-and-swap.
    pub conflicts: u64,
    /// Slicing passes performed (including the final empty one).
    pub rounds: u64,
    /// Frontier observed when the run finished.
    pub frontier: FrontierState,
}

impl ReduceReport {
    pub(crate) fn starting_at(frontier: FrontierState) -> Self {
        Self {
            committed_batches: 0,
            stale_rejections: 0,
            conflicts: 0,
            rounds: 0,
            frontier,
        }
    }
}
