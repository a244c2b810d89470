//! # Tincan Accessor
//!
//! Reactive accessors for Rust, built on tincan's fine-grained signals.
//!
//! An accessor is assembled from four declarative ingredients:
//!
//! - a **state** factory returning a record of fields,
//! - **getters**, pure functions of state (and other getters),
//! - **mutations**, synchronous functions that write state,
//! - **actions**, possibly asynchronous functions that read state and
//!   getters and commit mutations.
//!
//! Every state field becomes its own [`Signal`] and every getter a [`Memo`],
//! so reads are tracked field by field and getters recompute only when
//! something they read has changed.
//!
//! ## Accessor
//!
//! ```
//! use serde_json::{json, Value};
//! use tincan_accessor::{
//!     dump_state, load_state, make_accessor, payload, AccessorConfig, AccessorError, ActionTree,
//!     GetterTree, MutationTree,
//! };
//!
//! let accessor = make_accessor(
//!     AccessorConfig::new(|| json!({ "count": 0 }))
//!         .getters(GetterTree::new().getter("double", |state, _| {
//!             Ok(json!(state.get_as::<i64>("count")? * 2))
//!         }))
//!         .mutations(MutationTree::new().mutation("add", |state, payload| {
//!             let amount: i64 = payload.arg(0)?;
//!             state.update_as("count", |count: &mut i64| *count += amount)
//!         }))
//!         .actions(ActionTree::new().action("add_later", |store, payload| async move {
//!             store.commit("add", payload)?;
//!             Ok::<_, AccessorError>(Value::Null)
//!         })),
//! )
//! .unwrap();
//!
//! accessor.commit("add", payload![2]).unwrap();
//! assert_eq!(accessor.get("double").unwrap(), json!(4));
//!
//! futures::executor::block_on(accessor.dispatch("add_later", payload![1])).unwrap();
//! assert_eq!(accessor.get("count").unwrap(), json!(3));
//!
//! let saved = dump_state(&accessor);
//! accessor.set("count", json!(100)).unwrap();
//! load_state(&accessor, &saved).unwrap();
//! assert_eq!(accessor.get("count").unwrap(), json!(3));
//! ```
//!
//! ## Signals
//!
//! The reactive primitives underneath are available on their own:
//! - `Signal<T>` - Reactive values that notify dependents when changed
//! - `Memo<T>` - Computed values that automatically track dependencies
//! - `Effect` - Side effects that run when dependencies change

pub mod accessor;
pub mod error;
pub mod runtime;
pub mod signal;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use accessor::{
    action_tree, getter_tree, make_accessor, make_view, mutation_tree, Accessor, AccessorConfig,
    ActionFuture, ActionTree, BoundAction, BoundMutation, CollisionPolicy, GetterTree,
    MutationTree, Payload, View, ViewTarget,
};
pub use error::{AccessorError, Result, Scope, TreeKind};
pub use signal::{create_effect, create_memo, Effect, Memo, Signal};
pub use snapshot::{dump_state, dump_state_as, load_state, load_state_from};
pub use store::Store;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_works() {
        // Basic smoke test
        let accessor = make_accessor(
            AccessorConfig::new(|| json!({ "count": 0 })).mutations(
                MutationTree::new().mutation("set", |state, payload| {
                    state.set("count", payload.arg(0)?)
                }),
            ),
        )
        .unwrap();
        assert_eq!(accessor.get("count").unwrap(), json!(0));
        accessor.commit("set", payload![42]).unwrap();
        assert_eq!(accessor.get("count").unwrap(), json!(42));
    }
}
