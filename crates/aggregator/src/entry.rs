//! Request-level entry point: options in, per-sink payloads out

use contracts::{
    AppendResult, ResponsePayload, SinkKind, SinkReceipt, StoredRecord, SubmissionError,
    SubmissionOptions,
};
use serde::Serialize;
use tracing::instrument;

use crate::aggregator::SubmissionAggregator;
use crate::context::SinkConnector;

/// Environment variable consulted when `mongoUri` is not given
pub const MONGODB_URI_ENV: &str = "MONGODB_URI";

/// What each enabled sink returned
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mongo: Option<StoredRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<AppendResult>,
}

/// Handle one survey submission with abort-on-first-failure semantics
///
/// The document store URI falls back to `$MONGODB_URI`.
///
/// # Errors
/// Any configuration, precondition or sink error, unchanged.
#[instrument(name = "handle_survey_submission", skip_all, fields(mongo = options.mongo, check_duplicate = options.check_duplicate))]
pub async fn handle_survey_submission<C: SinkConnector>(
    aggregator: &SubmissionAggregator<C>,
    data: &ResponsePayload,
    options: &SubmissionOptions,
) -> Result<SubmissionOutcome, SubmissionError> {
    let fallback_uri = std::env::var(MONGODB_URI_ENV).ok();
    let config = options.to_sink_config(fallback_uri)?;
    let mut result = aggregator.submit(data, &config).await?;

    let mut outcome = SubmissionOutcome::default();
    for kind in [SinkKind::DocumentStore, SinkKind::Spreadsheet] {
        match result.take(kind) {
            Some(Ok(SinkReceipt::Document(record))) => outcome.mongo = Some(record),
            Some(Ok(SinkReceipt::Spreadsheet(append))) => outcome.sheets = Some(append),
            Some(Err(e)) => return Err(e),
            None => {}
        }
    }
    Ok(outcome)
}
