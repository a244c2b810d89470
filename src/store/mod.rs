//! The store handed to actions.
//!
//! A store bundles the three capability-scoped views an action works with:
//! read-only state, read-only getters, and the mutation invoker.

mod store;

pub use store::Store;
