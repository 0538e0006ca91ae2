// crates/batchred-core/src/reducer.rs

//! Fold domain: what a value must satisfy to be logged, and how values
//! combine into the aggregate.
//!
//! A [`Reducer`] works on the aggregate's numeric domain only. Padding is
//! handled by [`Reducer::fold_entry`] through the branch-free [`select`]
//! primitive, so a dummy entry leaves the accumulator untouched wherever it
//! sits in a batch.
//!
//! ## Invariants
//! - `combine` is associative and `merge(a, delta(batch))` equals folding the
//!   batch's real values into `a` one by one.
//! - `fold_entry(acc, Dummy) == acc`.

use crate::{Aggregate, BatchEntry, ReduceError, ReduceResult, Value};

/// Pick `when_true` if `cond` holds, otherwise `when_false`, without branching.
///
/// Constant structure so the same selection can live inside a proof circuit.
#[inline]
#[must_use]
pub const fn select(cond: bool, when_true: Aggregate, when_false: Aggregate) -> Aggregate {
    let mask = -(cond as Aggregate);
    (when_true & mask) | (when_false & !mask)
}

/// Associative fold over action values.
pub trait Reducer: Send + Sync {
    /// Domain precondition checked before a value is logged.
    ///
    /// # Errors
    /// [`ReduceError::Validation`] if `value` may not be dispatched.
    fn validate(&self, value: Value) -> ReduceResult<()>;

    /// Fold one value into the accumulator.
    #[must_use]
    fn combine(&self, acc: Aggregate, value: Value) -> Aggregate;

    /// Apply a batch delta (folded from the identity) to the aggregate.
    #[must_use]
    fn merge(&self, aggregate: Aggregate, delta: Aggregate) -> Aggregate;

    /// Fold one batch slot: `contribution = is_dummy ? 0 : value`.
    #[inline]
    #[must_use]
    fn fold_entry(&self, acc: Aggregate, entry: &BatchEntry) -> Aggregate {
        select(
            entry.is_dummy(),
            acc,
            self.combine(acc, entry.value_or_zero()),
        )
    }

    /// Delta of a whole batch, starting from the identity `0`.
    #[must_use]
    fn delta(&self, entries: &[BatchEntry]) -> Aggregate {
        entries.iter().fold(0, |acc, e| self.fold_entry(acc, e))
    }
}

/// Running sum of strictly positive values.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumReducer;

impl SumReducer {
    /// Construct a new [`SumReducer`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for SumReducer {
    fn validate(&self, value: Value) -> ReduceResult<()> {
        if value > 0 {
            Ok(())
        } else {
            Err(ReduceError::Validation(format!(
                "value must be strictly positive, got {value}"
            )))
        }
    }

    #[inline]
    fn combine(&self, acc: Aggregate, value: Value) -> Aggregate {
        acc.wrapping_add(Aggregate::from(value))
    }

    #[inline]
    fn merge(&self, aggregate: Aggregate, delta: Aggregate) -> Aggregate {
        aggregate.wrapping_add(delta)
    }
}
