//! Assertions over serialized plotting specifications.
//!
//! A chart element exposes its spec as a JSON document. Paths are JSON
//! pointers (`/encoding/x/type`) or dotted paths (`encoding.x.type`).

use crate::result::{VigilError, VigilResult};
use serde_json::Value;

/// A parsed JSON document with path-based assertions
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSpec {
    value: Value,
}

impl JsonSpec {
    /// Parse a JSON string
    pub fn parse(raw: &str) -> VigilResult<Self> {
        Ok(Self {
            value: serde_json::from_str(raw)?,
        })
    }

    /// Wrap an existing value
    #[must_use]
    pub const fn from_value(value: Value) -> Self {
        Self { value }
    }

    /// The whole document
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Value at `path`, if present
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.value.pointer(&to_pointer(path))
    }

    /// Whether `path` exists
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Assert the value at `path` equals `expected`
    pub fn assert_eq_at(&self, path: &str, expected: &Value) -> VigilResult<()> {
        match self.get(path) {
            Some(actual) if json_eq(actual, expected) => Ok(()),
            Some(actual) => Err(VigilError::mismatch(format!("spec {path}"), expected, actual)),
            None => Err(VigilError::mismatch(format!("spec {path}"), expected, "<absent>")),
        }
    }

    /// Assert `path` exists
    pub fn assert_present(&self, path: &str) -> VigilResult<()> {
        if self.has(path) {
            Ok(())
        } else {
            Err(VigilError::mismatch(format!("spec {path}"), "present", "<absent>"))
        }
    }

    /// Assert `path` does not exist
    pub fn assert_absent(&self, path: &str) -> VigilResult<()> {
        match self.get(path) {
            None => Ok(()),
            Some(actual) => Err(VigilError::mismatch(format!("spec {path}"), "<absent>", actual)),
        }
    }

    /// Assert the array or object at `path` has `expected` entries
    pub fn assert_len_at(&self, path: &str, expected: usize) -> VigilResult<()> {
        let len = match self.get(path) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(other) => {
                return Err(VigilError::mismatch(
                    format!("length of spec {path}"),
                    "an array or object",
                    other,
                ))
            }
            None => {
                return Err(VigilError::mismatch(
                    format!("length of spec {path}"),
                    expected,
                    "<absent>",
                ))
            }
        };
        if len == expected {
            Ok(())
        } else {
            Err(VigilError::mismatch(format!("length of spec {path}"), expected, len))
        }
    }
}

/// JSON equality where numbers compare by value, so `6` equals `6.0`.
/// Everything else compares structurally.
#[must_use]
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Normalize a dotted path into a JSON pointer
fn to_pointer(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        return path.to_string();
    }
    path.split('.')
        .map(|segment| segment.replace('~', "~0").replace('/', "~1"))
        .fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.push_str(&segment);
            acc
        })
}
