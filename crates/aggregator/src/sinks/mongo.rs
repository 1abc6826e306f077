//! MongoDocumentStore - submissions collection on a MongoDB deployment

use bson::{Bson, Document};
use contracts::{
    DocumentFilter, DocumentStore, ResponsePayload, StoredRecord, SubmissionError,
    SubmissionRecord,
};
use mongodb::{Client, Collection};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

const SINK_NAME: &str = "documentStore";

/// Database used when the URI names none
pub const DEFAULT_DATABASE: &str = "survey";

/// Collection holding one document per submission
pub const SUBMISSIONS_COLLECTION: &str = "submissions";

/// Persisted document shape
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MongoRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    survey_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    data: ResponsePayload,
    created_at: bson::DateTime,
}

/// Document store backed by a MongoDB collection
///
/// The driver client is created on first use, so building the store does no
/// I/O. The database comes from the URI path, `survey` when absent.
pub struct MongoDocumentStore {
    uri: String,
    client: OnceCell<Collection<MongoRecord>>,
}

impl std::fmt::Debug for MongoDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDocumentStore")
            .field("connected", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

impl MongoDocumentStore {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            client: OnceCell::new(),
        }
    }

    async fn collection(&self) -> Result<&Collection<MongoRecord>, SubmissionError> {
        self.client
            .get_or_try_init(|| async {
                let client = Client::with_uri_str(&self.uri)
                    .await
                    .map_err(|e| SubmissionError::sink_write(SINK_NAME, e.to_string()))?;
                let database = client
                    .default_database()
                    .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
                info!(database = %database.name(), "mongodb client connected");
                Ok::<_, SubmissionError>(database.collection::<MongoRecord>(SUBMISSIONS_COLLECTION))
            })
            .await
    }
}

fn filter_document(filter: &DocumentFilter) -> Document {
    let mut query = Document::new();
    if let Some(email) = &filter.email {
        query.insert("email", email.as_str());
    }
    if let Some(survey_id) = &filter.survey_id {
        query.insert("surveyId", survey_id.as_str());
    }
    query
}

impl DocumentStore for MongoDocumentStore {
    fn name(&self) -> &str {
        SUBMISSIONS_COLLECTION
    }

    #[instrument(name = "mongo_count_documents", skip_all)]
    async fn count_documents(&self, filter: &DocumentFilter) -> Result<u64, SubmissionError> {
        let collection = self.collection().await?;
        collection
            .count_documents(filter_document(filter))
            .await
            .map_err(|e| SubmissionError::sink_write(SINK_NAME, e.to_string()))
    }

    #[instrument(name = "mongo_save", skip_all)]
    async fn save(&self, record: SubmissionRecord) -> Result<StoredRecord, SubmissionError> {
        let collection = self.collection().await?;
        let stored = record.into_stored();
        let document = MongoRecord {
            id: stored.id.to_string(),
            survey_id: stored.survey_id.clone(),
            email: stored.email.clone(),
            data: stored.data.clone(),
            created_at: bson::DateTime::from_millis(stored.created_at.timestamp_millis()),
        };

        let result = collection
            .insert_one(&document)
            .await
            .map_err(|e| SubmissionError::sink_write(SINK_NAME, e.to_string()))?;

        match result.inserted_id {
            Bson::String(ref id) if *id == document.id => debug!(id = %id, "record inserted"),
            other => {
                return Err(SubmissionError::sink_write(
                    SINK_NAME,
                    format!("unexpected inserted id {other}"),
                ))
            }
        }
        Ok(stored)
    }
}
