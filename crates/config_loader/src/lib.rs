//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `SurveyConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("survey.toml")).unwrap();
//! println!("Policy: {:?}", config.sinks.policy);
//! ```

mod parser;
mod validator;

pub use contracts::SurveyConfig;
pub use parser::ConfigFormat;
pub use self::validator::SUPPORTED_DOCUMENT_SCHEMES;

use contracts::SubmissionError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SurveyConfig, SubmissionError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SurveyConfig, SubmissionError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already constructed configuration
    pub fn validate(config: &SurveyConfig) -> Result<(), SubmissionError> {
        validator::validate(config)
    }

    /// Serialize SurveyConfig to TOML string
    pub fn to_toml(config: &SurveyConfig) -> Result<String, SubmissionError> {
        toml::to_string_pretty(config)
            .map_err(|e| SubmissionError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SurveyConfig to JSON string
    pub fn to_json(config: &SurveyConfig) -> Result<String, SubmissionError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| SubmissionError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, SubmissionError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            SubmissionError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            SubmissionError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, SubmissionError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SurveyConfig, SubmissionError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[sinks.document_store]
uri = "memory://responses"
enforce_uniqueness = true
survey_id = "onboarding"

[sinks.spreadsheet]
spreadsheet_id = "sheet-1"
range = "Responses!A1"
api_key = "key"

[form]
upload_url = "https://uploads.example.com/api/files"

[form.css_classes]
root = "sv-root--compact"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        let store = config.sinks.document_store.unwrap();
        assert_eq!(store.survey_id.as_deref(), Some("onboarding"));
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.sinks.document_store, config2.sinks.document_store);
        assert_eq!(config.form, config2.form);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.sinks.spreadsheet, config2.sinks.spreadsheet);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[sinks.document_store]
uri = "postgres://localhost/db"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_unknown_extension() {
        let result = ConfigLoader::load_from_path(Path::new("survey.yaml"));
        assert!(matches!(result, Err(SubmissionError::ConfigParse { .. })));
    }
}
