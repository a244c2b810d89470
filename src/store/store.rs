use crate::accessor::{Payload, View};
use crate::error::Result;
use serde_json::Value;

/// The capabilities handed to an action.
///
/// An action can read state and getters and invoke mutations, but it cannot
/// write state directly: `state` and `getters` are read-only views and any
/// write through them fails.
///
/// Stores are cheap to clone, so an action can move one into its future.
#[derive(Clone, Debug)]
pub struct Store {
    /// Read-only view over the state fields.
    pub state: View,
    /// Read-only view over the getters.
    pub getters: View,
    /// Invoker view over the accessor's bound mutations.
    pub mutations: View,
}

impl Store {
    pub(crate) fn new(state: View, getters: View, mutations: View) -> Self {
        Self {
            state,
            getters,
            mutations,
        }
    }

    /// Invoke mutation `name`.
    pub fn commit(&self, name: &str, payload: impl Into<Payload>) -> Result<()> {
        self.mutations.call(name, payload)
    }

    /// Read a state field or, failing that, a getter.
    pub fn get(&self, key: &str) -> Result<Value> {
        if self.state.contains(key) {
            self.state.get(key)
        } else {
            self.getters.get(key)
        }
    }
}
