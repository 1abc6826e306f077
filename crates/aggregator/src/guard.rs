//! DuplicateGuard - point-in-time uniqueness check against the document store

use contracts::{DocumentFilter, DocumentStore, SubmissionError};
use tracing::{debug, instrument};

/// Checks whether a uniqueness key is already persisted
///
/// `exists` is true iff at least one matching record existed at query time.
/// There is no isolation against concurrent writers; callers that need
/// check-then-write atomicity serialise on the key themselves.
pub struct DuplicateGuard<'a, D> {
    store: &'a D,
    survey_id: Option<&'a str>,
}

impl<'a, D> DuplicateGuard<'a, D>
where
    D: DocumentStore + Sync,
{
    pub fn new(store: &'a D) -> Self {
        Self {
            store,
            survey_id: None,
        }
    }

    /// Only count records of one survey
    pub fn in_survey(mut self, survey_id: Option<&'a str>) -> Self {
        self.survey_id = survey_id;
        self
    }

    #[instrument(
        name = "duplicate_guard_exists",
        skip(self),
        fields(store = %self.store.name(), survey = ?self.survey_id)
    )]
    pub async fn exists(&self, key: &str) -> Result<bool, SubmissionError> {
        let filter = DocumentFilter::by_email(key).in_survey(self.survey_id);
        let count = self.store.count_documents(&filter).await?;
        debug!(count, "duplicate check");
        Ok(count > 0)
    }
}
