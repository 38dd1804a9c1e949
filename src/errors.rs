//! # Application Error Types
//!
//! This module defines common error types used throughout the SmartReceipt pipeline.
//! It provides structured error handling for the receipt processing components.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors (including a missing provider credential)
    Config(String),
    /// Validation errors (receipt bytes, user corrections, etc.)
    Validation(String),
    /// OCR processing errors
    Ocr(String),
    /// Generative model errors that escaped the fallback list
    Model(String),
    /// A receipt session was asked to skip or repeat a state
    InvalidTransition { from: String, action: String },
    /// Ledger export errors
    Export(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Ocr(msg) => write!(f, "[OCR] {}", msg),
            AppError::Model(msg) => write!(f, "[MODEL] {}", msg),
            AppError::InvalidTransition { from, action } => {
                write!(f, "[SESSION] cannot {} while receipt is {}", action, from)
            }
            AppError::Export(msg) => write!(f, "[EXPORT] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<crate::ocr_errors::OcrError> for AppError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        AppError::Ocr(err.to_string())
    }
}

impl From<crate::ai::ModelCallError> for AppError {
    fn from(err: crate::ai::ModelCallError) -> Self {
        AppError::Model(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use tracing::{error, warn};

    /// Log OCR processing errors with image and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        image_size: Option<u64>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            image_size_bytes = ?image_size,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log a single failed model attempt. Not an error on its own: the next
    /// model in the list is tried.
    pub fn log_model_attempt_failure(
        error: &impl std::fmt::Display,
        model: &str,
        attempt: usize,
        remaining: usize,
    ) {
        warn!(
            error = %error,
            model = %model,
            attempt = attempt,
            remaining_models = remaining,
            "Model call failed, falling back"
        );
    }

    /// Log exhaustion of the whole model list
    pub fn log_model_list_exhausted(models_tried: &[String]) {
        error!(
            models_tried = ?models_tried,
            "Every configured model failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| if v.chars().count() > 100 { format!("{}...", v.chars().take(100).collect::<String>()) } else { v.to_string() }),
            "Validation failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            "File system operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display_prefixes() {
        assert_eq!(
            AppError::Config("GEMINI_API_KEY missing".to_string()).to_string(),
            "[CONFIG] GEMINI_API_KEY missing"
        );
        let err = AppError::InvalidTransition {
            from: "Uploaded".to_string(),
            action: "confirm".to_string(),
        };
        assert_eq!(err.to_string(), "[SESSION] cannot confirm while receipt is Uploaded");
    }

    #[test]
    fn test_model_error_converts_to_app_error() {
        let err: AppError = crate::ai::ModelCallError::NotFound("gemini-pro".to_string()).into();
        assert!(matches!(err, AppError::Model(msg) if msg.contains("gemini-pro")));
    }

    #[test]
    fn test_ocr_error_converts_to_app_error() {
        let err: AppError =
            crate::ocr_errors::OcrError::Initialization("no spa.traineddata".to_string()).into();
        assert!(matches!(err, AppError::Ocr(msg) if msg.contains("spa.traineddata")));
    }
}
