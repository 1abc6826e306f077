//! SubmissionAggregator - precondition check and fan-out to the sinks

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use contracts::{
    DispatchPolicy, DocumentStore, DocumentStoreConfig, ObjectId, ResponsePayload, SinkConfig,
    SinkKind, SinkOutcome, SinkReceipt, SpreadsheetClient, SpreadsheetConfig, SubmissionError,
    SubmissionRecord, SubmissionResult,
};
use tracing::{debug, info, instrument, warn};

use crate::context::{SinkConnector, SinkContext};
use crate::guard::DuplicateGuard;

/// Accepts one response payload and writes it to every configured sink
///
/// When uniqueness is enforced the check and the document store write run
/// under a per-key lock held by the shared `SinkContext`, so two submissions
/// with the same email cannot both pass the check while they share a context.
pub struct SubmissionAggregator<C: SinkConnector> {
    context: Arc<SinkContext<C>>,
}

impl<C: SinkConnector> SubmissionAggregator<C> {
    pub fn new(connector: C) -> Self {
        Self::with_context(Arc::new(SinkContext::new(connector)))
    }

    pub fn with_context(context: Arc<SinkContext<C>>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<SinkContext<C>> {
        &self.context
    }

    /// Submit one payload
    ///
    /// # Errors
    /// - `Configuration` when a configured sink cannot be connected
    /// - `MissingKey` / `DuplicateSubmission` when the precondition fails;
    ///   no sink is written
    /// - `SinkWrite` under `AbortOnFirstFailure`, from the first failing sink
    ///
    /// Under `BestEffortAll` sink failures are captured in the result.
    #[instrument(
        name = "aggregator_submit",
        skip(self, payload, config),
        fields(
            policy = ?config.policy,
            payload_fields = payload.len(),
            document_store = config.document_store.is_some(),
            spreadsheet = config.spreadsheet.is_some()
        )
    )]
    pub async fn submit(
        &self,
        payload: &ResponsePayload,
        config: &SinkConfig,
    ) -> Result<SubmissionResult, SubmissionError> {
        let result = self.submit_inner(payload, config).await;
        match &result {
            Ok(outcome) => info!(
                succeeded = outcome.succeeded(),
                sinks = outcome.len(),
                "submission processed"
            ),
            Err(e) if e.is_precondition() => info!(reason = %e, "submission rejected"),
            Err(e) => warn!(error = %e, "submission failed"),
        }
        observability::record_submission(&result);
        result
    }

    async fn submit_inner(
        &self,
        payload: &ResponsePayload,
        config: &SinkConfig,
    ) -> Result<SubmissionResult, SubmissionError> {
        // Connect every configured sink before any write
        let documents = config
            .document_store
            .as_ref()
            .map(|cfg| self.context.documents(cfg).map(|store| (store, cfg)))
            .transpose()?;
        let sheets = config
            .spreadsheet
            .as_ref()
            .map(|cfg| self.context.sheets(cfg).map(|client| (client, cfg)))
            .transpose()?;

        let _key_guard = match &documents {
            Some((store, cfg)) if cfg.enforce_uniqueness => {
                let key = payload.uniqueness_key()?;
                let guard = self.context.lock_key(cfg, key).await;
                let exists = DuplicateGuard::new(&**store)
                    .in_survey(cfg.survey_id.as_deref())
                    .exists(key)
                    .await?;
                if exists {
                    return Err(SubmissionError::duplicate(key));
                }
                Some(guard)
            }
            _ => None,
        };

        let documents = documents.as_ref().map(|(store, cfg)| (&**store, *cfg));
        let sheets = sheets.as_ref().map(|(client, cfg)| (&**client, *cfg));

        let mut result = SubmissionResult::new();
        match config.policy {
            DispatchPolicy::BestEffortAll => {
                let (document, spreadsheet) = tokio::join!(
                    maybe_write(documents, |(store, cfg)| write_document(store, cfg, payload)),
                    maybe_write(sheets, |(client, cfg)| write_spreadsheet(client, cfg, payload)),
                );
                if let Some(outcome) = document {
                    result.record(SinkKind::DocumentStore, outcome);
                }
                if let Some(outcome) = spreadsheet {
                    result.record(SinkKind::Spreadsheet, outcome);
                }
            }
            DispatchPolicy::AbortOnFirstFailure => {
                if let Some((store, cfg)) = documents {
                    let receipt = write_document(store, cfg, payload).await?;
                    result.record(SinkKind::DocumentStore, Ok(receipt));
                }
                if let Some((client, cfg)) = sheets {
                    let receipt = write_spreadsheet(client, cfg, payload).await?;
                    result.record(SinkKind::Spreadsheet, Ok(receipt));
                }
            }
        }

        Ok(result)
    }

    /// Save `bytes` as `name` in the configured object store
    ///
    /// Not part of the submission fan-out.
    ///
    /// # Errors
    /// `Configuration` when no object store is configured.
    pub async fn store(
        &self,
        config: &SinkConfig,
        bytes: Bytes,
        name: &str,
    ) -> Result<ObjectId, SubmissionError> {
        let object_store = config.object_store.as_ref().ok_or_else(|| {
            SubmissionError::configuration("object_store", "no object store configured")
        })?;
        self.context.store_object(object_store, name, bytes).await
    }
}

async fn maybe_write<T, F, Fut>(target: Option<T>, write: F) -> Option<SinkOutcome>
where
    F: FnOnce(T) -> Fut,
    Fut: std::future::Future<Output = SinkOutcome>,
{
    match target {
        Some(target) => Some(write(target).await),
        None => None,
    }
}

/// Failures of a sink are reported as `SinkWrite` for that sink
fn as_sink_error(kind: SinkKind, error: SubmissionError) -> SubmissionError {
    match error {
        SubmissionError::SinkWrite { .. } => error,
        other => SubmissionError::sink_write(kind.as_str(), other.to_string()),
    }
}

fn finish(kind: SinkKind, started: Instant, outcome: &SinkOutcome) {
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    observability::record_sink_write(kind, outcome.is_ok(), latency_ms);
    match outcome {
        Ok(_) => debug!(sink = %kind, latency_ms, "sink write succeeded"),
        Err(e) => warn!(sink = %kind, latency_ms, error = %e, "sink write failed"),
    }
}

async fn write_document<D>(
    store: &D,
    config: &DocumentStoreConfig,
    payload: &ResponsePayload,
) -> SinkOutcome
where
    D: DocumentStore + Sync,
{
    let started = Instant::now();
    let record = SubmissionRecord::from_payload(payload, config.survey_id.as_deref());
    let outcome = store
        .save(record)
        .await
        .map(SinkReceipt::Document)
        .map_err(|e| as_sink_error(SinkKind::DocumentStore, e));
    finish(SinkKind::DocumentStore, started, &outcome);
    outcome
}

async fn write_spreadsheet<S>(
    client: &S,
    target: &SpreadsheetConfig,
    payload: &ResponsePayload,
) -> SinkOutcome
where
    S: SpreadsheetClient + Sync,
{
    let started = Instant::now();
    let outcome = client
        .append(target, vec![payload.to_row()])
        .await
        .map(SinkReceipt::Spreadsheet)
        .map_err(|e| as_sink_error(SinkKind::Spreadsheet, e));
    finish(SinkKind::Spreadsheet, started, &outcome);
    outcome
}
