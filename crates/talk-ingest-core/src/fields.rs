//! JSON field access with path-qualified errors.
//!
//! Upstream payloads use PascalCase keys. `null` and absent are treated the
//! same for every optional accessor.

use crate::{error::MalformedPayload, Timestamp};
use serde_json::Value;

#[derive(Debug, Clone)]
pub(crate) struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    pub(crate) fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub(crate) fn value(&self) -> &'a Value {
        self.value
    }

    /// Dotted path of this node; empty at the root
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key).filter(|v| !v.is_null())
    }

    /// Required nested object
    pub(crate) fn object(&self, key: &str) -> Result<Node<'a>, MalformedPayload> {
        self.optional_object(key)?
            .ok_or_else(|| MalformedPayload::missing(self.path_of(key)))
    }

    /// Optional nested object
    pub(crate) fn optional_object(&self, key: &str) -> Result<Option<Node<'a>>, MalformedPayload> {
        match self.get(key) {
            None => Ok(None),
            Some(value) if value.is_object() => Ok(Some(Node {
                value,
                path: self.path_of(key),
            })),
            Some(_) => Err(MalformedPayload::invalid(self.path_of(key), "must be an object")),
        }
    }

    /// Required string; may be empty
    pub(crate) fn string(&self, key: &str) -> Result<String, MalformedPayload> {
        match self.get(key) {
            None => Err(MalformedPayload::missing(self.path_of(key))),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(MalformedPayload::invalid(self.path_of(key), "must be a string")),
        }
    }

    /// Descriptive string; absent means empty
    pub(crate) fn text(&self, key: &str) -> Result<String, MalformedPayload> {
        match self.get(key) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(MalformedPayload::invalid(self.path_of(key), "must be a string")),
        }
    }

    /// Required non-empty identifier
    pub(crate) fn id(&self, key: &str) -> Result<String, MalformedPayload> {
        let value = self.string(key)?;
        if value.trim().is_empty() {
            return Err(MalformedPayload::missing(self.path_of(key)));
        }
        Ok(value)
    }

    /// Optional string; empty strings count as absent
    pub(crate) fn optional_string(&self, key: &str) -> Result<Option<String>, MalformedPayload> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(MalformedPayload::invalid(self.path_of(key), "must be a string")),
        }
    }

    /// Boolean flag; absent means `false`
    pub(crate) fn flag(&self, key: &str) -> Result<bool, MalformedPayload> {
        match self.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(MalformedPayload::invalid(self.path_of(key), "must be a boolean")),
        }
    }

    /// Integer counter; absent means `0`
    pub(crate) fn counter(&self, key: &str) -> Result<i32, MalformedPayload> {
        match self.get(key) {
            None => Ok(0),
            Some(value) => value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| {
                    MalformedPayload::invalid(self.path_of(key), "must be a 32-bit integer")
                }),
        }
    }

    /// Required timestamp
    pub(crate) fn timestamp(&self, key: &str) -> Result<Timestamp, MalformedPayload> {
        let raw = self.string(key)?;
        Timestamp::from_utc_str(&raw)
            .map_err(|e| MalformedPayload::invalid(self.path_of(key), e.to_string()))
    }

    /// Optional timestamp; absent is `None`, never a zero value
    pub(crate) fn optional_timestamp(&self, key: &str) -> Result<Option<Timestamp>, MalformedPayload> {
        match self.optional_string(key)? {
            None => Ok(None),
            Some(raw) => Timestamp::from_utc_str(&raw)
                .map(Some)
                .map_err(|e| MalformedPayload::invalid(self.path_of(key), e.to_string())),
        }
    }

    /// Optional array; absent is empty
    pub(crate) fn list(&self, key: &str) -> Result<&'a [Value], MalformedPayload> {
        match self.get(key) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(MalformedPayload::invalid(self.path_of(key), "must be an array")),
        }
    }

    /// Element `index` of a list obtained from `key`
    pub(crate) fn element(&self, key: &str, index: usize, value: &'a Value) -> Node<'a> {
        Node {
            value,
            path: format!("{}[{}]", self.path_of(key), index),
        }
    }
}

#[cfg(test)]
#[path = "fields_tests.rs"]
mod tests;
