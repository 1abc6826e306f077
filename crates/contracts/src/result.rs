//! SubmissionResult - per-sink outcome map

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{StoredRecord, SubmissionError};

/// Sinks taking part in the submission fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SinkKind {
    DocumentStore,
    Spreadsheet,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentStore => "documentStore",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spreadsheet append result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: u64,
}

/// Object store identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub bucket: String,
    pub name: String,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}

/// Sink-specific success value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SinkReceipt {
    Document(StoredRecord),
    Spreadsheet(AppendResult),
}

/// Outcome of one sink write
pub type SinkOutcome = Result<SinkReceipt, SubmissionError>;

/// Accumulated per-sink outcomes of one submission
///
/// Only configured sinks appear. The caller decides what counts as overall
/// success.
#[derive(Debug, Default)]
pub struct SubmissionResult {
    outcomes: BTreeMap<SinkKind, SinkOutcome>,
}

impl SubmissionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one sink
    pub fn record(&mut self, kind: SinkKind, outcome: SinkOutcome) {
        self.outcomes.insert(kind, outcome);
    }

    pub fn get(&self, kind: SinkKind) -> Option<&SinkOutcome> {
        self.outcomes.get(&kind)
    }

    pub fn document_store(&self) -> Option<&SinkOutcome> {
        self.get(SinkKind::DocumentStore)
    }

    pub fn spreadsheet(&self) -> Option<&SinkOutcome> {
        self.get(SinkKind::Spreadsheet)
    }

    pub fn take(&mut self, kind: SinkKind) -> Option<SinkOutcome> {
        self.outcomes.remove(&kind)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SinkKind, &SinkOutcome)> {
        self.outcomes.iter()
    }

    /// Number of sinks that were written successfully
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_ok()).count()
    }

    /// Sinks whose write failed
    pub fn failures(&self) -> impl Iterator<Item = (SinkKind, &SubmissionError)> {
        self.outcomes
            .iter()
            .filter_map(|(kind, outcome)| outcome.as_ref().err().map(|e| (*kind, e)))
    }

    /// Render as `{sink: {"ok": ...} | {"error": "..."}}`
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (kind, outcome) in &self.outcomes {
            let entry = match outcome {
                Ok(receipt) => json!({ "ok": receipt }),
                Err(e) => json!({ "error": e.to_string() }),
            };
            map.insert(kind.as_str().to_string(), entry);
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_and_success_count() {
        let mut result = SubmissionResult::new();
        result.record(
            SinkKind::DocumentStore,
            Err(SubmissionError::sink_write("documentStore", "down")),
        );
        result.record(
            SinkKind::Spreadsheet,
            Ok(SinkReceipt::Spreadsheet(AppendResult::default())),
        );

        assert_eq!(result.len(), 2);
        assert_eq!(result.succeeded(), 1);
        let failed: Vec<_> = result.failures().map(|(k, _)| k).collect();
        assert_eq!(failed, vec![SinkKind::DocumentStore]);
    }

    #[test]
    fn test_to_json_shape() {
        let mut result = SubmissionResult::new();
        result.record(
            SinkKind::Spreadsheet,
            Err(SubmissionError::sink_write("spreadsheet", "quota exceeded")),
        );
        let json = result.to_json();
        assert_eq!(
            json["spreadsheet"]["error"],
            "sink 'spreadsheet' write error: quota exceeded"
        );
        assert!(json.get("documentStore").is_none());
    }

    #[test]
    fn test_object_id_display() {
        let id = ObjectId {
            bucket: "uploads".into(),
            name: "cv.pdf".into(),
        };
        assert_eq!(id.to_string(), "gs://uploads/cv.pdf");
    }
}
