//! # OCR Error Types Module
//!
//! Error types for the image → text half of the pipeline.

use crate::preprocessing::PreprocessingError;

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// Receipt bytes rejected before decoding (size, format)
    Validation(String),
    /// Bytes do not represent a supported image
    Decode(String),
    /// Recognition engine could not be initialized. Fatal to the process.
    Initialization(String),
    /// Text extraction errors
    Extraction(String),
    /// Timeout errors
    Timeout(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Validation(msg) => write!(f, "[VALIDATION] Receipt image rejected: {}", msg),
            OcrError::Decode(msg) => write!(f, "[DECODE] Receipt image could not be decoded: {}", msg),
            OcrError::Initialization(msg) => write!(f, "[OCR_INIT] Text recognition unavailable: {}", msg),
            OcrError::Extraction(msg) => write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg),
            OcrError::Timeout(msg) => write!(f, "[OCR_TIMEOUT] OCR processing timed out: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<PreprocessingError> for OcrError {
    fn from(err: PreprocessingError) -> Self {
        match err {
            PreprocessingError::Validation { message } => OcrError::Validation(message),
            PreprocessingError::Decode { message } => OcrError::Decode(message),
            PreprocessingError::ProcessingFailed { message } => OcrError::Extraction(message),
        }
    }
}
