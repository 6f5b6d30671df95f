//! Per-candidate extraction context
//!
//! The context is the only input to the output templates. It is filled from
//! the rule's constants, then from primary selectors, then (optionally) from
//! a secondary source, and is dropped once the record has been rendered.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A single extracted value
///
/// Node-scoped selectors always produce `Text`. Document-scoped selectors
/// produce `List` when more than one node matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Returns the value as a single string
    ///
    /// Lists render as their items separated by a space inside brackets.
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Returns true for an empty text or an empty list
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(" ")),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Key/value bag for one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractionContext {
    fields: HashMap<String, FieldValue>,
}

impl ExtractionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with the rule's static constants
    pub fn with_constants(constants: &HashMap<String, String>) -> Self {
        let fields = constants
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::Text(v.clone())))
            .collect();
        Self { fields }
    }

    /// Sets a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Merges another set of fields; keys present in `other` win
    pub fn merge(&mut self, other: impl IntoIterator<Item = (String, FieldValue)>) {
        self.fields.extend(other);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serializes the context as a flat JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }
}
