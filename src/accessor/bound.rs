use crate::accessor::payload::Payload;
use crate::accessor::tree::{ActionFn, ActionFuture, MutationFn, MutationTree};
use crate::accessor::view::{View, ViewTarget};
use crate::error::{AccessorError, Result, Scope, TreeKind};
use crate::runtime::ReactiveRuntime;
use crate::store::Store;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A mutation with its state argument already supplied.
///
/// The body runs untracked: an effect or getter that commits a mutation does
/// not come to depend on the fields the mutation reads.
#[derive(Clone)]
pub struct BoundMutation {
    name: Arc<str>,
    call: Arc<dyn Fn(Payload) -> Result<()> + Send + Sync>,
}

impl BoundMutation {
    pub(crate) fn bind(
        name: &str,
        mutation: MutationFn,
        state: View,
        runtime: Arc<ReactiveRuntime>,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let label = Arc::clone(&name);
        Self {
            name,
            call: Arc::new(move |payload: Payload| {
                trace!(mutation = %label, args = payload.len(), "commit");
                runtime.untracked(|| mutation(&state, payload))
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the mutation. Errors raised by its body are returned unchanged.
    pub fn call(&self, payload: impl Into<Payload>) -> Result<()> {
        (self.call)(payload.into())
    }
}

impl fmt::Debug for BoundMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundMutation").field(&self.name).finish()
    }
}

/// An action with its store argument already supplied.
///
/// Like mutations, the part of the action that runs on dispatch is untracked.
#[derive(Clone)]
pub struct BoundAction {
    name: Arc<str>,
    call: Arc<dyn Fn(Payload) -> ActionFuture + Send + Sync>,
}

impl BoundAction {
    pub(crate) fn bind(
        name: &str,
        action: ActionFn,
        store: Store,
        runtime: Arc<ReactiveRuntime>,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let label = Arc::clone(&name);
        Self {
            name,
            call: Arc::new(move |payload: Payload| {
                trace!(action = %label, args = payload.len(), "dispatch");
                runtime.untracked(|| action(store.clone(), payload))
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the action.
    ///
    /// The action body runs immediately up to its first suspension point;
    /// the returned future resolves to its result.
    pub fn call(&self, payload: impl Into<Payload>) -> ActionFuture {
        (self.call)(payload.into())
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundAction").field(&self.name).finish()
    }
}

/// Bound mutations by name; the target of the mutation invoker view.
pub(crate) struct MutationTable {
    bound: IndexMap<String, BoundMutation>,
}

impl MutationTable {
    pub(crate) fn bind(
        tree: &MutationTree,
        state: &View,
        runtime: &Arc<ReactiveRuntime>,
    ) -> Self {
        let bound = tree
            .iter()
            .map(|(name, mutation)| {
                let bound = BoundMutation::bind(
                    name,
                    Arc::clone(mutation),
                    state.clone(),
                    Arc::clone(runtime),
                );
                (name.clone(), bound)
            })
            .collect();
        Self { bound }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&BoundMutation> {
        self.bound.get(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.bound.len()
    }
}

impl ViewTarget for MutationTable {
    fn scope(&self) -> Scope {
        Scope::MutationView
    }

    fn read(&self, key: &str) -> Result<Value> {
        Err(AccessorError::WrongKind {
            key: key.to_string(),
            expected: TreeKind::State,
            found: TreeKind::Mutation,
        })
    }

    fn invoke(&self, key: &str, payload: Payload) -> Result<()> {
        let mutation = self.get(key).ok_or_else(|| AccessorError::UnknownKey {
            key: key.to_string(),
            scope: Scope::MutationView,
        })?;
        mutation.call(payload)
    }
}
