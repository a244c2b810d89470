use crate::accessor::payload::Payload;
use crate::error::{AccessorError, Result, Scope};
use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Something a [`View`] forwards to.
///
/// Targets hold the live data; views only decide which keys are visible and
/// whether writes and invocations are allowed through them.
pub trait ViewTarget: Send + Sync {
    /// Where errors raised through this target are reported.
    fn scope(&self) -> Scope;

    /// Read the current value of `key`.
    fn read(&self, key: &str) -> Result<Value>;

    /// Overwrite the value of `key`.
    fn write(&self, key: &str, _value: Value) -> Result<()> {
        Err(AccessorError::ReadOnly {
            key: key.to_string(),
            scope: self.scope(),
        })
    }

    /// Invoke `key` with a payload.
    fn invoke(&self, key: &str, _payload: Payload) -> Result<()> {
        Err(AccessorError::NotInvocable {
            key: key.to_string(),
            scope: self.scope(),
        })
    }
}

/// A capability-scoped façade over a target and a fixed set of keys.
///
/// Views never copy: every read goes to the target, so a view always sees
/// the latest value. A read-only view rejects `set` and `call` with an error
/// instead of ignoring them.
#[derive(Clone)]
pub struct View {
    target: Arc<dyn ViewTarget>,
    keys: Arc<IndexSet<String>>,
    writable: bool,
}

/// Build a view exposing exactly `keys` of `target`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::{json, Value};
/// use tincan_accessor::{make_view, Result, Scope, ViewTarget};
///
/// struct Constant;
///
/// impl ViewTarget for Constant {
///     fn scope(&self) -> Scope {
///         Scope::StateView
///     }
///
///     fn read(&self, _key: &str) -> Result<Value> {
///         Ok(json!(1))
///     }
/// }
///
/// let view = make_view(Arc::new(Constant), ["one"], false);
/// assert_eq!(view.get("one").unwrap(), json!(1));
/// assert!(view.get("two").is_err());
/// assert!(view.set("one", json!(2)).is_err());
/// ```
pub fn make_view<I, K>(target: Arc<dyn ViewTarget>, keys: I, writable: bool) -> View
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    View {
        target,
        keys: Arc::new(keys.into_iter().map(Into::into).collect()),
        writable,
    }
}

impl View {
    /// Read `key`.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.check_key(key)?;
        self.target.read(key)
    }

    /// Read `key` and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|err| AccessorError::serialization(key, err))
    }

    /// Overwrite `key`. Fails on a read-only view.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_key(key)?;
        if !self.writable {
            return Err(AccessorError::ReadOnly {
                key: key.to_string(),
                scope: self.scope(),
            });
        }
        self.target.write(key, value)
    }

    /// Serialize `value` and write it to `key`.
    pub fn set_to<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| AccessorError::serialization(key, err))?;
        self.set(key, value)
    }

    /// Read, modify and write back `key`.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> R) -> Result<R> {
        let mut value = self.get(key)?;
        let result = f(&mut value);
        self.set(key, value)?;
        Ok(result)
    }

    /// Like [`update`](Self::update), going through a typed value.
    ///
    /// ```
    /// # use serde_json::json;
    /// # use tincan_accessor::{make_accessor, AccessorConfig, MutationTree};
    /// let accessor = make_accessor(
    ///     AccessorConfig::new(|| json!({ "count": 0 })).mutations(
    ///         MutationTree::new().mutation("increment", |state, _| {
    ///             state.update_as("count", |count: &mut i64| *count += 1)
    ///         }),
    ///     ),
    /// )
    /// .unwrap();
    ///
    /// accessor.commit("increment", ()).unwrap();
    /// assert_eq!(accessor.get("count").unwrap(), json!(1));
    /// ```
    pub fn update_as<T, R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut value: T = self.get_as(key)?;
        let result = f(&mut value);
        self.set_to(key, &value)?;
        Ok(result)
    }

    /// Invoke `key` with a payload. Fails unless the view is writable and its
    /// target is invocable.
    pub fn call(&self, key: &str, payload: impl Into<Payload>) -> Result<()> {
        self.check_key(key)?;
        if !self.writable {
            return Err(AccessorError::NotInvocable {
                key: key.to_string(),
                scope: self.scope(),
            });
        }
        self.target.invoke(key, payload.into())
    }

    /// Keys visible through this view, in definition order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn scope(&self) -> Scope {
        self.target.scope()
    }

    /// A read-only view over the same target and keys.
    pub fn read_only(&self) -> View {
        View {
            target: Arc::clone(&self.target),
            keys: Arc::clone(&self.keys),
            writable: false,
        }
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if self.keys.contains(key) {
            Ok(())
        } else {
            Err(AccessorError::UnknownKey {
                key: key.to_string(),
                scope: self.scope(),
            })
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("scope", &self.scope())
            .field("keys", &self.keys)
            .field("writable", &self.writable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Record {
        values: Mutex<HashMap<String, Value>>,
        calls: Mutex<Vec<(String, Payload)>>,
    }

    impl ViewTarget for Record {
        fn scope(&self) -> Scope {
            Scope::StateView
        }

        fn read(&self, key: &str) -> Result<Value> {
            Ok(self.values.lock().get(key).cloned().unwrap_or(Value::Null))
        }

        fn write(&self, key: &str, value: Value) -> Result<()> {
            self.values.lock().insert(key.to_string(), value);
            Ok(())
        }

        fn invoke(&self, key: &str, payload: Payload) -> Result<()> {
            self.calls.lock().push((key.to_string(), payload));
            Ok(())
        }
    }

    #[test]
    fn views_forward_live_values() {
        let record = Arc::new(Record::default());
        let writable = make_view(record.clone(), ["a", "b"], true);
        let readonly = writable.read_only();

        writable.set("a", json!(1)).unwrap();
        assert_eq!(readonly.get("a").unwrap(), json!(1));

        record.write("a", json!(2)).unwrap();
        assert_eq!(readonly.get_as::<i32>("a").unwrap(), 2);
    }

    #[test]
    fn read_only_view_fails_loudly() {
        let record = Arc::new(Record::default());
        let view = make_view(record.clone(), ["a"], false);

        assert_eq!(
            view.set("a", json!(5)),
            Err(AccessorError::ReadOnly {
                key: "a".into(),
                scope: Scope::StateView
            })
        );
        assert!(matches!(
            view.call("a", ()),
            Err(AccessorError::NotInvocable { .. })
        ));
        assert!(record.values.lock().is_empty());
    }

    #[test]
    fn keys_outside_the_view_are_unknown() {
        let record = Arc::new(Record::default());
        let view = make_view(record, ["a"], true);

        assert!(matches!(
            view.get("b"),
            Err(AccessorError::UnknownKey { .. })
        ));
        assert_eq!(view.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn call_forwards_payload() {
        let record = Arc::new(Record::default());
        let view = make_view(record.clone(), ["go"], true);

        view.call("go", json!(3)).unwrap();
        let calls = record.calls.lock();
        assert_eq!(calls[0].0, "go");
        assert_eq!(calls[0].1.arg::<i32>(0).unwrap(), 3);
    }

    #[test]
    fn update_as_round_trips_typed_value() {
        let record = Arc::new(Record::default());
        let view = make_view(record, ["list"], true);
        view.set("list", json!([1, 2])).unwrap();

        let len = view
            .update_as("list", |list: &mut Vec<i32>| {
                list.push(3);
                list.len()
            })
            .unwrap();
        assert_eq!(len, 3);
        assert_eq!(view.get("list").unwrap(), json!([1, 2, 3]));
    }
}
