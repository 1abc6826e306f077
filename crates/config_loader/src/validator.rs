//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (validator derive): id / range / bucket / uri 非空
//! - document_store.uri 使用受支持的 scheme
//! - spreadsheet 至少配置 api_key 或 access_token 之一
//! - form.upload_url 必须是 http(s)
//! - css_classes 的 key 非空

use contracts::{SubmissionError, SurveyConfig};
use validator::Validate;

/// Document store URI schemes with a linked backend
pub const SUPPORTED_DOCUMENT_SCHEMES: &[&str] = &["memory", "file", "mongodb", "mongodb+srv"];

/// 校验 SurveyConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &SurveyConfig) -> Result<(), SubmissionError> {
    validate_fields(config)?;
    validate_document_store(config)?;
    validate_spreadsheet(config)?;
    validate_form(config)?;
    Ok(())
}

/// 字段级规则
fn validate_fields(config: &SurveyConfig) -> Result<(), SubmissionError> {
    config
        .validate()
        .map_err(|e| SubmissionError::config_validation("sinks", e.to_string()))
}

/// 校验 document store URI scheme
fn validate_document_store(config: &SurveyConfig) -> Result<(), SubmissionError> {
    let Some(store) = &config.sinks.document_store else {
        return Ok(());
    };

    let scheme = store.uri.split_once("://").map(|(scheme, _)| scheme);
    match scheme {
        Some(scheme) if SUPPORTED_DOCUMENT_SCHEMES.contains(&scheme) => Ok(()),
        Some(scheme) => Err(SubmissionError::config_validation(
            "sinks.document_store.uri",
            format!(
                "unsupported scheme '{scheme}', expected one of {SUPPORTED_DOCUMENT_SCHEMES:?}"
            ),
        )),
        None => Err(SubmissionError::config_validation(
            "sinks.document_store.uri",
            format!("'{}' is not a URI", store.uri),
        )),
    }
}

/// 校验 spreadsheet 凭据
fn validate_spreadsheet(config: &SurveyConfig) -> Result<(), SubmissionError> {
    let Some(sheet) = &config.sinks.spreadsheet else {
        return Ok(());
    };

    let has_token = sheet
        .access_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    if sheet.api_key.is_empty() && !has_token {
        return Err(SubmissionError::config_validation(
            "sinks.spreadsheet",
            "either api_key or access_token must be set",
        ));
    }
    Ok(())
}

/// 校验表单配置
fn validate_form(config: &SurveyConfig) -> Result<(), SubmissionError> {
    if let Some(url) = &config.form.upload_url {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SubmissionError::config_validation(
                "form.upload_url",
                format!("upload endpoint must be http(s), got '{}'", url.scheme()),
            ));
        }
    }

    for key in config.form.css_classes.keys() {
        if key.trim().is_empty() {
            return Err(SubmissionError::config_validation(
                "form.css_classes",
                "css class key cannot be empty",
            ));
        }
    }
    Ok(())
}
