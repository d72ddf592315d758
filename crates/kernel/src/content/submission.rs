//! Submitted form data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Form fields posted to an entry endpoint.
///
/// Keys ending in `[]` collect into an array under the bare name; any other
/// repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission(Map<String, Value>);

impl Submission {
    /// Build from decoded `application/x-www-form-urlencoded` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Map::new();

        for (key, value) in pairs {
            if let Some(name) = key.strip_suffix("[]") {
                let slot = map
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match slot {
                    Value::Array(values) => values.push(Value::String(value)),
                    other => *other = Value::Array(vec![Value::String(value)]),
                }
            } else {
                map.insert(key, Value::String(value));
            }
        }

        Self(map)
    }

    /// Wrap an existing JSON object (e.g. a revision snapshot).
    pub fn from_value(value: &Value) -> Self {
        Self(value.as_object().cloned().unwrap_or_default())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of a key, if it is a string.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Trimmed string value, `None` when missing or blank.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.text(key).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Truthy flag: present, non-empty and not `"0"`.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            Some(Value::Bool(b)) => *b,
            Some(Value::Array(values)) => !values.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The payload to persist: everything except `_`-prefixed control keys
    /// such as the CSRF token.
    pub fn to_payload(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }
}

/// Whether a submitted value counts as empty for validation.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(values)) => values.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}
