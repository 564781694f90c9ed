//! Typed access to a resource's JSON state.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::utils::is_empty_value;

/// A resource or data source state: a JSON object keyed by attribute name.
///
/// Getters treat `null` as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    values: Map<String, Value>,
}

impl ResourceData {
    /// Wrap a state value. Anything that is not an object yields an empty state.
    pub fn new(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn id(&self) -> &str {
        self.get_str("id").unwrap_or_default()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.values.insert("id".to_string(), Value::String(id.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// The value of `key` unless it is the zero value of its type.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !is_empty_value(v))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// The list (or set) stored under `key`, or an empty slice.
    pub fn get_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A string that must be present, e.g. `workspace_id` on every call.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.get_str(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Validation(format!("missing required attribute '{key}'")))
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Whether any of `keys` differs between `prior` and this state.
    pub fn has_change(&self, prior: &ResourceData, keys: &[&str]) -> bool {
        keys.iter().any(|key| {
            let now = self.get(key);
            let before = prior.get(key);
            now != before
        })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Value> for ResourceData {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
