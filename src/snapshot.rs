//! Snapshot and restore of an accessor's state.
//!
//! Both functions work on the accessor's own state record rather than its
//! public surface: a dump sees fields shadowed by getters, and a load writes
//! fields without going through any mutation. Loading is meant for hydration,
//! e.g. restoring persisted state at startup.

use crate::accessor::{json_kind, Accessor};
use crate::error::{AccessorError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// A plain, untracked deep copy of the accessor's state.
///
/// Reading does not register dependencies, and the copy shares nothing with
/// the accessor: changing it does not affect later reads.
pub fn dump_state(accessor: &Accessor) -> Value {
    Value::Object(accessor.raw_state().to_plain())
}

/// [`dump_state`] deserialized into a caller-defined record.
pub fn dump_state_as<T: DeserializeOwned>(accessor: &Accessor) -> Result<T> {
    serde_json::from_value(dump_state(accessor))
        .map_err(|err| AccessorError::serialization("state", err))
}

/// Overwrite state fields from a plain record.
///
/// Every field present in `new_state` is written; fields it omits keep their
/// value and keys that are not state fields are ignored. The set of fields
/// never changes, so existing subscriptions on them stay valid.
pub fn load_state(accessor: &Accessor, new_state: &Value) -> Result<()> {
    let Value::Object(record) = new_state else {
        return Err(AccessorError::StateNotRecord {
            found: json_kind(new_state),
        });
    };

    let state = accessor.raw_state();
    let applied = state.apply(record);
    debug!(
        applied,
        ignored = record.len() - applied,
        fields = state.len(),
        "loaded state"
    );
    Ok(())
}

/// Serialize a caller-defined record and [`load_state`] it.
pub fn load_state_from<T: Serialize + ?Sized>(accessor: &Accessor, new_state: &T) -> Result<()> {
    let value =
        serde_json::to_value(new_state).map_err(|err| AccessorError::serialization("state", err))?;
    load_state(accessor, &value)
}
