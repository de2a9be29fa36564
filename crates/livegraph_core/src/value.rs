// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute values and the versioned containers that hold them.
//!
//! Every port, prop and state field carries a [`Value`]. Nodes never hand
//! out long-lived references to their containers; readers go through
//! [`Attributes::get`] and compare [`Attributes::version`] to notice change.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Dynamic value carried by ports and state fields
pub type Value = serde_json::Value;

/// Keyed set of values, usually a partial update addressed by port key
pub type Payload = IndexMap<String, Value>;

/// Versioned key/value container used for props, state and output caches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    values: IndexMap<String, Value>,
    #[serde(skip)]
    version: u64,
}

impl Attributes {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container seeded with the given values
    pub fn from_payload(values: Payload) -> Self {
        Self { values, version: 0 }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a value as `f64`, if present and numeric
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Monotonic counter, bumped on every mutation that changed something
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set a single value
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if !self.values.get(&key).is_some_and(|old| values_equal(old, &value)) {
            self.values.insert(key, value);
            self.version += 1;
        }
    }

    /// Shallow-merge a patch into this container.
    ///
    /// Returns `true` if any stored value changed.
    pub fn merge(&mut self, patch: &Payload) -> bool {
        let mut changed = false;
        for (key, value) in patch {
            if !self.values.get(key).is_some_and(|old| values_equal(old, value)) {
                self.values.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Take an owned copy of the current contents
    pub fn snapshot(&self) -> Attributes {
        self.clone()
    }

    /// Borrow the underlying map
    pub fn as_payload(&self) -> &Payload {
        &self.values
    }
}

impl From<Payload> for Attributes {
    fn from(values: Payload) -> Self {
        Self::from_payload(values)
    }
}

/// Deep equality where numbers compare by magnitude, so `5` equals `5.0`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Build a [`Payload`] from `(key, value)` pairs
pub fn payload<K, I>(entries: I) -> Payload
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_bumps_version_only_on_change() {
        let mut attrs = Attributes::new();
        assert!(attrs.merge(&payload([("a", json!(1))])));
        assert_eq!(attrs.version(), 1);

        assert!(!attrs.merge(&payload([("a", json!(1))])));
        assert_eq!(attrs.version(), 1);

        attrs.set("b", json!({"x": 1}));
        assert_eq!(attrs.version(), 2);
        assert_eq!(attrs.get("b"), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_numbers_compare_by_magnitude() {
        assert!(values_equal(&json!(5), &json!(5.0)));
        assert!(values_equal(&json!({"v": [1, 2.0]}), &json!({"v": [1.0, 2]})));
        assert!(!values_equal(&json!(5), &json!(5.5)));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!values_equal(&json!("5"), &json!(5)));

        let mut attrs = Attributes::from_payload(payload([("a", json!(5))]));
        attrs.set("a", json!(5.0));
        assert!(!attrs.merge(&payload([("a", json!(5.0))])));
        assert_eq!(attrs.version(), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut attrs = Attributes::from_payload(payload([("a", json!(1))]));
        let old = attrs.snapshot();
        attrs.set("a", json!(2));
        assert_eq!(old.get("a"), Some(&json!(1)));
        assert_eq!(attrs.get_f64("a"), Some(2.0));
    }
}
