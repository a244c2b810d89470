//! Error type shared by the accessor, its views and snapshot functions.

use std::fmt;
use thiserror::Error;

/// Which of the four definition trees a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKind {
    /// A field of the state record.
    State,
    /// A computed getter.
    Getter,
    /// A synchronous mutation.
    Mutation,
    /// A possibly asynchronous action.
    Action,
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TreeKind::State => "state",
            TreeKind::Getter => "getters",
            TreeKind::Mutation => "mutations",
            TreeKind::Action => "actions",
        })
    }
}

/// Where a failed lookup or write was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The accessor itself.
    Accessor,
    /// A view over state fields.
    StateView,
    /// A view over getters.
    GetterView,
    /// A view that invokes mutations.
    MutationView,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Accessor => "accessor",
            Scope::StateView => "state view",
            Scope::GetterView => "getter view",
            Scope::MutationView => "mutation view",
        })
    }
}

/// Errors raised while building or using an accessor.
///
/// The type is `Clone` so that a getter whose evaluation failed can cache the
/// failure like any other result until one of its inputs changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessorError {
    #[error("key `{key}` is defined in both {first} and {second}")]
    DuplicateKey {
        key: String,
        first: TreeKind,
        second: TreeKind,
    },

    #[error("state factory must return an object, got {found}")]
    StateNotRecord { found: &'static str },

    #[error("unknown key `{key}` on {scope}")]
    UnknownKey { key: String, scope: Scope },

    #[error("`{key}` is read-only on {scope}")]
    ReadOnly { key: String, scope: Scope },

    #[error("`{key}` cannot be invoked on {scope}")]
    NotInvocable { key: String, scope: Scope },

    #[error("`{key}` is a member of {found}, expected {expected}")]
    WrongKind {
        key: String,
        expected: TreeKind,
        found: TreeKind,
    },

    #[error("getter `{key}` depends on itself")]
    CyclicGetter { key: String },

    #[error("payload argument {index}: {message}")]
    Payload { index: usize, message: String },

    #[error("cannot convert `{key}`: {message}")]
    Serialization { key: String, message: String },

    #[error("{0}")]
    Failed(String),
}

impl AccessorError {
    /// An application-level failure raised from a getter, mutation or action.
    pub fn failed(message: impl Into<String>) -> Self {
        AccessorError::Failed(message.into())
    }

    pub(crate) fn serialization(key: &str, err: serde_json::Error) -> Self {
        AccessorError::Serialization {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = AccessorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_key_and_trees() {
        let err = AccessorError::DuplicateKey {
            key: "count".into(),
            first: TreeKind::State,
            second: TreeKind::Getter,
        };
        assert_eq!(
            err.to_string(),
            "key `count` is defined in both state and getters"
        );

        let err = AccessorError::ReadOnly {
            key: "count".into(),
            scope: Scope::StateView,
        };
        assert_eq!(err.to_string(), "`count` is read-only on state view");
    }
}
