//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::SurveyConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_store: Option<String>,
    enforce_uniqueness: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    spreadsheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    object_store: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_url: Option<String>,
    css_class_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(config: &SurveyConfig) -> ConfigSummary {
    let sinks = &config.sinks;
    ConfigSummary {
        version: format!("{:?}", config.version),
        policy: format!("{:?}", sinks.policy),
        document_store: sinks.document_store.as_ref().map(|d| d.uri.clone()),
        enforce_uniqueness: sinks.enforces_uniqueness(),
        spreadsheet: sinks
            .spreadsheet
            .as_ref()
            .map(|s| format!("{} ({})", s.spreadsheet_id, s.range)),
        object_store: sinks.object_store.as_ref().map(|o| o.bucket.clone()),
        upload_url: config.form.upload_url.as_ref().map(|u| u.to_string()),
        css_class_count: config.form.css_classes.len(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &SurveyConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let sinks = &config.sinks;

    if sinks.document_store.is_none() && sinks.spreadsheet.is_none() {
        warnings.push("No sinks configured - submissions will not be persisted".to_string());
    }

    if let Some(documents) = &sinks.document_store {
        if documents.uri.starts_with("memory://") {
            warnings.push(format!(
                "Document store '{}' is in-process and does not outlive the command",
                documents.uri
            ));
        }
    }

    if let Some(sheet) = &sinks.spreadsheet {
        if sheet.access_token.is_none() {
            warnings.push(
                "spreadsheet.access_token is not set - appends with an API key alone are usually rejected"
                    .to_string(),
            );
        }
    }

    if config.form.upload_url.is_none() {
        warnings.push("form.upload_url is not set - file uploads will not be bound".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Policy: {}", summary.policy);
            if let Some(ref uri) = summary.document_store {
                println!(
                    "  Document store: {} (uniqueness: {})",
                    uri, summary.enforce_uniqueness
                );
            }
            if let Some(ref sheet) = summary.spreadsheet {
                println!("  Spreadsheet: {}", sheet);
            }
            if let Some(ref bucket) = summary.object_store {
                println!("  Object store: {}", bucket);
            }
            if let Some(ref url) = summary.upload_url {
                println!("  Upload URL: {}", url);
            }
            println!("  CSS classes: {}", summary.css_class_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
