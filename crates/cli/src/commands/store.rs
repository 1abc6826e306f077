//! `store` command implementation.

use aggregator::{MemoryConnector, SinkConnector, SubmissionAggregator};
use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::SinkConfig;
use tracing::info;

use super::{http_connector, load_config};
use crate::cli::StoreArgs;
use crate::error::CliError;

/// Execute the `store` command
pub async fn run_store(args: &StoreArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| CliError::ObjectName {
                path: args.file.clone(),
            })?,
    };

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    info!(file = %args.file.display(), name = %name, size = bytes.len(), "Storing file");

    if args.endpoints.dry_run {
        let aggregator = SubmissionAggregator::new(MemoryConnector::new());
        store_with(&aggregator, &config.sinks, Bytes::from(bytes), &name).await
    } else {
        let aggregator = SubmissionAggregator::new(http_connector(&args.endpoints)?);
        store_with(&aggregator, &config.sinks, Bytes::from(bytes), &name).await
    }
}

async fn store_with<C: SinkConnector>(
    aggregator: &SubmissionAggregator<C>,
    sinks: &SinkConfig,
    bytes: Bytes,
    name: &str,
) -> Result<()> {
    let id = aggregator
        .store(sinks, bytes, name)
        .await
        .context("Failed to store object")?;
    println!("{id}");
    Ok(())
}
