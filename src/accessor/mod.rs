//! Accessor construction.
//!
//! An accessor merges four definition trees into one object:
//!
//! - state fields, readable and writable by key,
//! - getters, read-only values computed from state and other getters,
//! - mutations, synchronous state writers called with their payload only,
//! - actions, possibly asynchronous operations that read state and getters
//!   and commit mutations through a [`Store`](crate::Store).
//!
//! Getters, mutations and actions never see the accessor itself. Each gets a
//! [`View`] scoped to what its role allows.

mod bound;
mod builder;
mod getters;
mod payload;
mod state;
mod tree;
mod view;

pub use bound::{BoundAction, BoundMutation};
pub use builder::{make_accessor, Accessor, AccessorConfig, CollisionPolicy};
pub use payload::Payload;
pub use tree::{
    action_tree, getter_tree, mutation_tree, ActionFn, ActionFuture, ActionTree, GetterFn,
    GetterTree, MutationFn, MutationTree,
};
pub use view::{make_view, View, ViewTarget};

pub(crate) use state::json_kind;
