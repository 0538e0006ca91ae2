use batchred_core::{Ledger, Position, ReduceResult, Reducer, Value};
use tracing::debug;

/// Validate `value` against the reducer's precondition, then append it.
///
/// Nothing is appended when validation fails. Safe to call from any number of
/// producers concurrently; position assignment is serialized by the ledger.
///
/// # Errors
/// [`batchred_core::ReduceError::Validation`] from the reducer, or whatever the
/// ledger's `append` reports.
pub fn dispatch<L, R>(ledger: &L, reducer: &R, value: Value) -> ReduceResult<Position>
where
    L: Ledger + ?Sized,
    R: Reducer + ?Sized,
{
    reducer.validate(value)?;
    let position = ledger.append(value)?;
    debug!(position, value, "dispatched");
    Ok(position)
}
