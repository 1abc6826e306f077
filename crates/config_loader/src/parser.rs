//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{SubmissionError, SurveyConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<SurveyConfig, SubmissionError> {
    toml::from_str(content).map_err(|e| SubmissionError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<SurveyConfig, SubmissionError> {
    serde_json::from_str(content).map_err(|e| SubmissionError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<SurveyConfig, SubmissionError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DispatchPolicy;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[sinks]
policy = "abort_on_first_failure"

[sinks.document_store]
uri = "memory://responses"
enforce_uniqueness = true

[form]
upload_url = "https://uploads.example.com/api/files"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.sinks.policy, DispatchPolicy::AbortOnFirstFailure);
        assert!(config.sinks.enforces_uniqueness());
        assert!(config.sinks.spreadsheet.is_none());
        assert_eq!(
            config.form.upload_url.unwrap().as_str(),
            "https://uploads.example.com/api/files"
        );
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "sinks": {
                "spreadsheet": {
                    "spreadsheet_id": "sheet-1",
                    "range": "Sheet1!A1",
                    "api_key": "key"
                }
            },
            "form": { "css_classes": { "root": "sv-root--compact" } }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.sinks.policy, DispatchPolicy::BestEffortAll);
        assert_eq!(config.form.css_classes["root"], "sv-root--compact");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, SubmissionError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_upload_url() {
        let content = r#"
[form]
upload_url = "not a url"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
