//! `submit` command implementation.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use aggregator::{MemoryConnector, SinkConnector, SubmissionAggregator};
use anyhow::{Context, Result};
use contracts::{ResponsePayload, SinkConfig};
use observability::SubmissionMetricsAggregator;
use serde_json::Value;
use tracing::info;

use super::{http_connector, load_config};
use crate::cli::SubmitArgs;
use crate::error::CliError;

/// Execute the `submit` command
pub async fn run_submit(args: &SubmitArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(policy) = args.policy {
        info!(policy = ?policy, "Overriding dispatch policy from CLI");
        config.sinks.policy = policy.into();
    }

    let payload = read_payload(&args.payload)?;
    info!(fields = payload.len(), "Payload loaded");

    if args.endpoints.dry_run {
        info!("Dry run mode - writing to in-process sinks");
        let connector = MemoryConnector::new();
        let aggregator = SubmissionAggregator::new(connector);
        submit_with(&aggregator, &payload, &config.sinks).await?;
        for row in aggregator.context().connector().sheets().rows() {
            println!("spreadsheet row: {}", Value::Array(row));
        }
        Ok(())
    } else {
        let aggregator = SubmissionAggregator::new(http_connector(&args.endpoints)?);
        submit_with(&aggregator, &payload, &config.sinks).await
    }
}

async fn submit_with<C: SinkConnector>(
    aggregator: &SubmissionAggregator<C>,
    payload: &ResponsePayload,
    sinks: &SinkConfig,
) -> Result<()> {
    let started = Instant::now();
    let result = aggregator.submit(payload, sinks).await;

    let mut stats = SubmissionMetricsAggregator::new();
    stats.update(&result, started.elapsed().as_secs_f64() * 1000.0);
    info!(summary = %stats, "Submission finished");

    let result = result.context("Submission failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result.to_json()).context("Failed to serialize result")?
    );

    let failed = result.failures().count();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: result.len(),
        }
        .into());
    }
    Ok(())
}

/// Read a JSON object payload from a file, or stdin for "-"
fn read_payload(path: &Path) -> Result<ResponsePayload> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| CliError::payload_read(path, e))?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|e| CliError::payload_read(path, e))?
    };
    parse_payload(&content)
}

fn parse_payload(content: &str) -> Result<ResponsePayload> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| CliError::payload_format(e.to_string()))?;
    ResponsePayload::try_from(value)
        .map_err(|e| CliError::payload_format(e.to_string()).into())
}
