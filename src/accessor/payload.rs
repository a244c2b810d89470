use crate::error::{AccessorError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Positional arguments passed to a mutation or action after the implicit
/// state/store argument.
///
/// Build one with the [`payload!`](crate::payload) macro, from a
/// `Vec<Value>`, from a single `Value`, or from `()` for no arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload(Vec<Value>);

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `arg`, serialized to JSON.
    ///
    /// Fails with [`AccessorError::Payload`] when `arg` cannot be represented
    /// as JSON, where [`payload!`](crate::payload) would panic.
    pub fn with_arg<T: Serialize + ?Sized>(mut self, arg: &T) -> Result<Self> {
        let value = serde_json::to_value(arg).map_err(|err| AccessorError::Payload {
            index: self.0.len(),
            message: err.to_string(),
        })?;
        self.0.push(value);
        Ok(self)
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no arguments were passed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw argument at `index`, if present.
    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserialize the argument at `index`.
    ///
    /// Fails with [`AccessorError::Payload`] when the argument is missing or
    /// has the wrong shape.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.0.get(index).ok_or_else(|| AccessorError::Payload {
            index,
            message: "missing argument".to_string(),
        })?;
        T::deserialize(value).map_err(|err| AccessorError::Payload {
            index,
            message: err.to_string(),
        })
    }

    /// Deserialize the argument at `index`, falling back to `default` when it
    /// was not passed.
    pub fn arg_or<T: DeserializeOwned>(&self, index: usize, default: T) -> Result<T> {
        if index >= self.0.len() {
            return Ok(default);
        }
        self.arg(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Payload {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl FromIterator<Value> for Payload {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build a [`Payload`] from JSON-convertible expressions.
///
/// # Panics
///
/// Panics if an argument's `Serialize` impl fails, for example a map with
/// non-string keys. Use [`Payload::with_arg`] for values that may not
/// serialize.
///
/// ```
/// use tincan_accessor::payload;
///
/// let args = payload![3, "four", [5, 6]];
/// assert_eq!(args.len(), 3);
/// assert_eq!(args.arg::<i64>(0).unwrap(), 3);
/// assert!(payload![].is_empty());
/// ```
#[macro_export]
macro_rules! payload {
    () => {
        $crate::Payload::new()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::Payload::from(::std::vec![$($crate::__private::serde_json::json!($arg)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_arguments() {
        let payload = Payload::from(vec![json!(3), json!("x")]);
        assert_eq!(payload.arg::<u32>(0).unwrap(), 3);
        assert_eq!(payload.arg::<String>(1).unwrap(), "x");
        assert_eq!(payload.arg_or::<u32>(2, 10).unwrap(), 10);
    }

    #[test]
    fn missing_and_mistyped_arguments() {
        let payload = Payload::from(json!("not a number"));
        assert!(matches!(
            payload.arg::<i64>(0),
            Err(AccessorError::Payload { index: 0, .. })
        ));
        assert_eq!(
            payload.arg::<i64>(1),
            Err(AccessorError::Payload {
                index: 1,
                message: "missing argument".to_string()
            })
        );
    }

    #[test]
    fn with_arg_reports_unserializable_values() {
        use std::collections::BTreeMap;

        let payload = Payload::new().with_arg(&3).unwrap().with_arg("x").unwrap();
        assert_eq!(payload, Payload::from(vec![json!(3), json!("x")]));

        let bad: BTreeMap<(i32, i32), i32> = BTreeMap::from([((1, 2), 3)]);
        assert!(matches!(
            payload.with_arg(&bad),
            Err(AccessorError::Payload { index: 2, .. })
        ));
    }
}
