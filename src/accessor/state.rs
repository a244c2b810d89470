use crate::accessor::view::ViewTarget;
use crate::error::{AccessorError, Result, Scope};
use crate::runtime::ReactiveRuntime;
use crate::signal::Signal;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The state record with every field held in its own signal.
///
/// The set of fields is fixed when the record is created; later writes only
/// replace values, so dependents subscribed to a field stay subscribed.
pub(crate) struct ReactiveState {
    fields: IndexMap<String, Signal<Value>>,
    runtime: Arc<ReactiveRuntime>,
}

impl ReactiveState {
    pub(crate) fn new(runtime: &Arc<ReactiveRuntime>, record: Map<String, Value>) -> Self {
        let fields = record
            .into_iter()
            .map(|(key, value)| (key, Signal::new_in(Arc::clone(runtime), value)))
            .collect();
        Self {
            fields,
            runtime: Arc::clone(runtime),
        }
    }

    pub(crate) fn field(&self, key: &str) -> Option<&Signal<Value>> {
        self.fields.get(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub(crate) fn len(&self) -> usize {
        self.fields.len()
    }

    /// Deep, untracked copy of every field.
    pub(crate) fn to_plain(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, signal)| (key.clone(), signal.get_untracked()))
            .collect()
    }

    /// Overwrite the fields that `record` provides. Returns how many fields
    /// were written; keys that are not fields are skipped.
    ///
    /// Effects see the record fully applied and run once each.
    pub(crate) fn apply(&self, record: &Map<String, Value>) -> usize {
        self.runtime.batch(|| {
            let mut applied = 0;
            for (key, signal) in &self.fields {
                if let Some(value) = record.get(key) {
                    signal.set(value.clone());
                    applied += 1;
                }
            }
            applied
        })
    }
}

impl ViewTarget for ReactiveState {
    fn scope(&self) -> Scope {
        Scope::StateView
    }

    fn read(&self, key: &str) -> Result<Value> {
        self.field(key)
            .map(Signal::get)
            .ok_or_else(|| AccessorError::UnknownKey {
                key: key.to_string(),
                scope: Scope::StateView,
            })
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        let field = self.field(key).ok_or_else(|| AccessorError::UnknownKey {
            key: key.to_string(),
            scope: Scope::StateView,
        })?;
        field.set(value);
        Ok(())
    }
}

/// Name of a JSON value's type, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
