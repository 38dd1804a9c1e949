//! # Text Extraction Module
//!
//! Converts a receipt photo into text fragments. The recognition engine is
//! pluggable through [`TextRecognizer`]; the production engine is Tesseract
//! via `leptess`, reached through the shared [`OcrInstanceManager`].
//!
//! Photos that cannot be decoded, and recognizers that fail or run past the
//! configured timeout, produce [`ExtractionOutcome::NoText`] rather than an
//! error. The only error that escapes [`extract_text`] is an engine that
//! cannot be initialized at all.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{GrayImage, ImageFormat};
use tracing::{debug, info, warn, Instrument};

use crate::errors::error_logging;
use crate::instance_manager::OcrInstanceManager;
use crate::observability;
use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;
use crate::preprocessing::preprocess_receipt;
use crate::receipt::{ExtractedText, RawReceiptImage};
use crate::text_processing::normalize_fragments;

/// A text recognition engine.
///
/// Implementations receive an already binarized luminance image and return
/// the recognized text lines in reading order. Recognition is blocking work;
/// callers run it off the async executor.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<String>, OcrError>;
}

/// Tesseract-backed recognizer sharing one lazily created engine.
pub struct TesseractRecognizer {
    manager: Arc<OcrInstanceManager>,
}

impl TesseractRecognizer {
    pub fn new(manager: Arc<OcrInstanceManager>) -> Self {
        Self { manager }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<String>, OcrError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::Extraction(format!("failed to encode binarized image: {}", e)))?;

        let instance = self.manager.get_instance()?;
        let raw_text = {
            let mut tess = instance.lock();
            tess.set_image_from_mem(&png).map_err(|e| {
                OcrError::Extraction(format!("failed to load image into Tesseract: {}", e))
            })?;
            tess.get_utf8_text().map_err(|e| {
                OcrError::Extraction(format!("failed to extract text from image: {}", e))
            })?
        };

        Ok(split_fragments(&raw_text))
    }
}

/// Split raw recognizer output into trimmed, non-empty lines
pub fn split_fragments(raw_text: &str) -> Vec<String> {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Why a receipt yielded no text
#[derive(Debug, Clone, PartialEq)]
pub enum NoTextReason {
    /// Bytes were rejected or could not be decoded as an image
    Undecodable(String),
    /// The recognizer ran and found nothing
    NothingRecognized,
    /// The recognizer failed on this image
    RecognitionFailed(String),
    /// Recognition ran past the configured timeout
    TimedOut,
}

/// Result of running text extraction on one receipt
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Extracted(ExtractedText),
    NoText(NoTextReason),
}

impl ExtractionOutcome {
    /// The extracted text; empty for `NoText`
    pub fn text(&self) -> ExtractedText {
        match self {
            ExtractionOutcome::Extracted(text) => text.clone(),
            ExtractionOutcome::NoText(_) => ExtractedText::empty(),
        }
    }

    pub fn into_text(self) -> ExtractedText {
        match self {
            ExtractionOutcome::Extracted(text) => text,
            ExtractionOutcome::NoText(_) => ExtractedText::empty(),
        }
    }
}

/// Extract and normalize the text of a receipt photo.
///
/// Preprocessing and recognition run on the blocking pool under
/// `config.operation_timeout_secs`. Text is normalized and bounded to
/// `config.max_text_chars` before it is returned.
///
/// The timeout only stops waiting. A blocking task cannot be cancelled, so a
/// recognition that overruns keeps running, and keeps holding the shared
/// Tesseract lock, until it finishes. Receipts submitted meanwhile queue
/// behind it and may time out as well.
///
/// # Errors
///
/// Only `OcrError::Initialization`; every other failure is reported as
/// [`ExtractionOutcome::NoText`].
pub async fn extract_text(
    image: &RawReceiptImage,
    config: &OcrConfig,
    recognizer: Arc<dyn TextRecognizer>,
) -> Result<ExtractionOutcome, OcrError> {
    let span = observability::ocr_span("extract_text");
    let start_time = Instant::now();
    let image_size = image.len() as u64;

    let result = run_recognition(image, config, recognizer)
        .instrument(span)
        .await;
    let duration = start_time.elapsed();

    let fragments = match result {
        Ok(fragments) => fragments,
        Err(OcrError::Initialization(msg)) => {
            observability::record_ocr_metrics(false, duration, image_size);
            let err = OcrError::Initialization(msg);
            error_logging::log_ocr_error(&err, "extract_text", Some(image_size), Some(duration));
            return Err(err);
        }
        Err(err) => {
            observability::record_ocr_metrics(false, duration, image_size);
            let reason = match &err {
                OcrError::Validation(msg) | OcrError::Decode(msg) => {
                    NoTextReason::Undecodable(msg.clone())
                }
                OcrError::Timeout(_) => NoTextReason::TimedOut,
                other => NoTextReason::RecognitionFailed(other.to_string()),
            };
            warn!(
                error = %err,
                image_size_bytes = image_size,
                elapsed_ms = duration.as_millis() as u64,
                "No text extracted from receipt"
            );
            return Ok(ExtractionOutcome::NoText(reason));
        }
    };

    observability::record_ocr_metrics(true, duration, image_size);

    let normalized = normalize_fragments(&fragments, config.max_text_chars);
    if normalized.is_empty() {
        info!(elapsed_ms = duration.as_millis() as u64, "Recognizer found no text");
        return Ok(ExtractionOutcome::NoText(NoTextReason::NothingRecognized));
    }

    info!(
        fragments = fragments.len(),
        chars = normalized.chars().count(),
        elapsed_ms = duration.as_millis() as u64,
        "Receipt text extracted"
    );
    Ok(ExtractionOutcome::Extracted(ExtractedText::from_parts(
        fragments, normalized,
    )))
}

async fn run_recognition(
    image: &RawReceiptImage,
    config: &OcrConfig,
    recognizer: Arc<dyn TextRecognizer>,
) -> Result<Vec<String>, OcrError> {
    let timeout_duration = Duration::from_secs(config.operation_timeout_secs);
    let bytes = image.bytes.clone();
    let task_config = config.clone();

    let handle = tokio::task::spawn_blocking(move || {
        let receipt = preprocess_receipt(&bytes, &task_config)?;
        debug!(
            width = receipt.image.width(),
            height = receipt.image.height(),
            threshold = receipt.threshold,
            "Running recognizer"
        );
        recognizer.recognize(&receipt.image)
    });

    // On timeout the task is detached, not aborted
    match tokio::time::timeout(timeout_duration, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(OcrError::Extraction(format!(
            "recognition task failed: {}",
            join_error
        ))),
        Err(_) => Err(OcrError::Timeout(format!(
            "OCR operation timed out after {} seconds",
            config.operation_timeout_secs
        ))),
    }
}
