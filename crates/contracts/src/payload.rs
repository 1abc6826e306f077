//! ResponsePayload - one completed survey response
//!
//! Open-ended mapping from field name to answer value. Iteration order is the
//! insertion order of the answers (serde_json `preserve_order`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SubmissionError;

/// Field used as the uniqueness key for duplicate detection
pub const UNIQUENESS_FIELD: &str = "email";

/// Survey response payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponsePayload(Map<String, Value>);

impl ResponsePayload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert an answer, returning the previous value if any
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate answers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// The email answer, if present as a non-empty string
    pub fn email(&self) -> Option<&str> {
        self.0
            .get(UNIQUENESS_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Extract the uniqueness key
    ///
    /// # Errors
    /// `MissingKey` when the payload carries no usable email.
    pub fn uniqueness_key(&self) -> Result<&str, SubmissionError> {
        self.email()
            .ok_or_else(|| SubmissionError::missing_key(UNIQUENESS_FIELD))
    }

    /// Project the answers into a single spreadsheet row
    ///
    /// Strings are kept verbatim, scalars stay JSON scalars, `null` becomes an
    /// empty cell and nested values are written as compact JSON text.
    pub fn to_row(&self) -> Vec<Value> {
        self.0.values().map(cell_value).collect()
    }
}

fn cell_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
    }
}

impl From<Map<String, Value>> for ResponsePayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ResponsePayload {
    type Error = SubmissionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SubmissionError::Other(format!(
                "response payload must be a JSON object, got {other}"
            ))),
        }
    }
}
