//! Document store record shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ResponsePayload;

/// A response ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub data: ResponsePayload,
}

impl SubmissionRecord {
    /// Build a record from a payload, copying its email answer
    pub fn from_payload(payload: &ResponsePayload, survey_id: Option<&str>) -> Self {
        Self {
            survey_id: survey_id.map(str::to_string),
            email: payload.email().map(str::to_string),
            data: payload.clone(),
        }
    }

    /// Assign the server-side identity: a fresh id and `created_at = now`
    pub fn into_stored(self) -> StoredRecord {
        StoredRecord {
            id: Uuid::new_v4(),
            survey_id: self.survey_id,
            email: self.email,
            data: self.data,
            created_at: Utc::now(),
        }
    }
}

/// A record as persisted by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub data: ResponsePayload,

    pub created_at: DateTime<Utc>,
}

/// Count filter for the document store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentFilter {
    pub email: Option<String>,
    pub survey_id: Option<String>,
}

impl DocumentFilter {
    /// Filter on the uniqueness key
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            survey_id: None,
        }
    }

    /// Narrow the filter to one survey
    pub fn in_survey(mut self, survey_id: Option<&str>) -> Self {
        self.survey_id = survey_id.map(str::to_string);
        self
    }

    /// Whether a stored record satisfies every set criterion
    pub fn matches(&self, record: &StoredRecord) -> bool {
        let email_ok = match &self.email {
            Some(email) => record.email.as_deref() == Some(email.as_str()),
            None => true,
        };
        let survey_ok = match &self.survey_id {
            Some(survey) => record.survey_id.as_deref() == Some(survey.as_str()),
            None => true,
        };
        email_ok && survey_ok
    }
}
