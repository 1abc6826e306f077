//! Command implementations.

mod store;
mod submit;
mod validate;

pub use store::run_store;
pub use submit::run_submit;
pub use validate::run_validate;

use std::path::Path;

use aggregator::HttpConnector;
use anyhow::{Context, Result};
use contracts::SurveyConfig;
use tracing::info;

use crate::cli::EndpointArgs;
use crate::error::CliError;

/// Load and validate the configuration file
fn load_config(path: &Path) -> Result<SurveyConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }
    let config = config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    info!(
        config = %path.display(),
        policy = ?config.sinks.policy,
        "Configuration loaded"
    );
    Ok(config)
}

/// HTTP connector honouring the endpoint overrides
fn http_connector(endpoints: &EndpointArgs) -> Result<HttpConnector> {
    let mut connector = HttpConnector::new(reqwest::Client::new())?;
    if let Some(base) = &endpoints.sheets_endpoint {
        info!(endpoint = %base, "Overriding Sheets endpoint");
        connector = connector.with_sheets_base(base.clone());
    }
    if let Some(base) = &endpoints.storage_endpoint {
        info!(endpoint = %base, "Overriding Cloud Storage endpoint");
        connector = connector.with_storage_base(base.clone());
    }
    Ok(connector)
}
