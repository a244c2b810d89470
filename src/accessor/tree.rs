//! Definition trees: named getters, mutations and actions.

use crate::accessor::payload::Payload;
use crate::accessor::view::View;
use crate::error::Result;
use crate::store::Store;
use futures::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// `(state, getters) -> value`, both views read-only.
pub type GetterFn = Arc<dyn Fn(&View, &View) -> Result<Value> + Send + Sync>;

/// `(state, payload)`, with a writable state view.
pub type MutationFn = Arc<dyn Fn(&View, Payload) -> Result<()> + Send + Sync>;

/// The eventual outcome of an action.
pub type ActionFuture = BoxFuture<'static, Result<Value>>;

/// `(store, payload) -> future`.
pub type ActionFn = Arc<dyn Fn(Store, Payload) -> ActionFuture + Send + Sync>;

macro_rules! tree_common {
    ($tree:ident, $handler:ty) => {
        impl $tree {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn len(&self) -> usize {
                self.entries.len()
            }

            pub fn is_empty(&self) -> bool {
                self.entries.is_empty()
            }

            pub fn contains(&self, name: &str) -> bool {
                self.entries.contains_key(name)
            }

            /// Names in definition order.
            pub fn keys(&self) -> impl Iterator<Item = &String> {
                self.entries.keys()
            }

            pub(crate) fn get(&self, name: &str) -> Option<&$handler> {
                self.entries.get(name)
            }

            pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &$handler)> {
                self.entries.iter()
            }
        }

        impl std::fmt::Debug for $tree {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_set().entries(self.entries.keys()).finish()
            }
        }
    };
}

/// Named getter definitions.
///
/// Defining a name twice keeps the last definition.
#[derive(Clone, Default)]
pub struct GetterTree {
    entries: IndexMap<String, GetterFn>,
}

tree_common!(GetterTree, GetterFn);

impl GetterTree {
    /// Add a getter.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&View, &View) -> Result<Value> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(getter));
        self
    }
}

/// Named mutation definitions.
#[derive(Clone, Default)]
pub struct MutationTree {
    entries: IndexMap<String, MutationFn>,
}

tree_common!(MutationTree, MutationFn);

impl MutationTree {
    /// Add a mutation.
    pub fn mutation<F>(mut self, name: impl Into<String>, mutation: F) -> Self
    where
        F: Fn(&View, Payload) -> Result<()> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(mutation));
        self
    }
}

/// Named action definitions.
#[derive(Clone, Default)]
pub struct ActionTree {
    entries: IndexMap<String, ActionFn>,
}

tree_common!(ActionTree, ActionFn);

impl ActionTree {
    /// Add an action.
    ///
    /// The closure itself runs as soon as the action is dispatched; the
    /// future it returns carries whatever happens after the first await.
    pub fn action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Store, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.entries
            .insert(name.into(), Arc::new(move |store, payload| action(store, payload).boxed()));
        self
    }

    /// Add an action that completes without suspending.
    pub fn action_sync<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Store, Payload) -> Result<Value> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            Arc::new(move |store, payload| future::ready(action(store, payload)).boxed()),
        );
        self
    }
}

/// Tie a getter tree to the state factory it reads.
///
/// Returns `tree` unchanged; it exists so definitions can be written next to
/// the state they belong to.
pub fn getter_tree<F>(_state: &F, tree: GetterTree) -> GetterTree
where
    F: Fn() -> Value,
{
    tree
}

/// Tie a mutation tree to the state factory it writes. Returns `tree`
/// unchanged.
pub fn mutation_tree<F>(_state: &F, tree: MutationTree) -> MutationTree
where
    F: Fn() -> Value,
{
    tree
}

/// Tie an action tree to the state factory of its store. Returns `tree`
/// unchanged.
pub fn action_tree<F>(_state: &F, tree: ActionTree) -> ActionTree
where
    F: Fn() -> Value,
{
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_definition_replaces_earlier() {
        let tree = GetterTree::new()
            .getter("a", |_, _| Ok(json!(1)))
            .getter("b", |_, _| Ok(json!(2)))
            .getter("a", |_, _| Ok(json!(3)));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn tagging_helpers_return_their_input() {
        let state = || json!({ "count": 0 });
        let mutations = mutation_tree(
            &state,
            MutationTree::new().mutation("reset", |state, _| state.set("count", json!(0))),
        );
        let actions = action_tree(&state, ActionTree::new().action_sync("noop", |_, _| Ok(Value::Null)));
        let getters = getter_tree(&state, GetterTree::new());

        assert!(mutations.contains("reset"));
        assert!(actions.contains("noop"));
        assert!(getters.is_empty());
        assert_eq!(format!("{mutations:?}"), r#"{"reset"}"#);
    }
}
