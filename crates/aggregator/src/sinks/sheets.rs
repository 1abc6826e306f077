//! GoogleSheetsClient - values:append over the Sheets REST API

use contracts::{AppendResult, SinkKind, SpreadsheetClient, SpreadsheetConfig, SubmissionError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendResult>,
}

/// Spreadsheet client speaking the Sheets v4 API
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    client: Client,
    base_url: Url,
}

impl GoogleSheetsClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn sink_error(message: impl Into<String>) -> SubmissionError {
        SubmissionError::sink_write(SinkKind::Spreadsheet.as_str(), message)
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}:append`
    fn append_url(&self, target: &SpreadsheetConfig) -> Result<Url, SubmissionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SubmissionError::configuration("sheets.base_url", "base URL cannot hold a path")
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", target.spreadsheet_id.as_str(), "values"])
            .push(&format!("{}:append", target.range));

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("valueInputOption", "USER_ENTERED");
            if !target.api_key.is_empty() {
                query.append_pair("key", &target.api_key);
            }
        }
        Ok(url)
    }
}

impl SpreadsheetClient for GoogleSheetsClient {
    #[instrument(
        name = "sheets_append",
        skip(self, target, values),
        fields(spreadsheet = %target.spreadsheet_id, range = %target.range, rows = values.len())
    )]
    async fn append(
        &self,
        target: &SpreadsheetConfig,
        values: Vec<Vec<Value>>,
    ) -> Result<AppendResult, SubmissionError> {
        let url = self.append_url(target)?;
        let mut request = self.client.post(url).json(&json!({ "values": values }));
        if let Some(token) = &target.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::sink_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::sink_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: AppendResponse = response
            .json()
            .await
            .map_err(|e| Self::sink_error(format!("unreadable append response: {e}")))?;
        let result = body.updates.unwrap_or_default();
        debug!(updated_rows = result.updated_rows, "rows appended");
        Ok(result)
    }
}
