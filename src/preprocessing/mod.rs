//! # Receipt Preprocessing Module
//!
//! Turns the raw bytes of a receipt photo into a binary image for text
//! recognition:
//!
//! 1. validate the byte buffer (size limits, magic-byte format sniffing)
//! 2. decode it with the `image` crate
//! 3. convert to single-channel luminance
//! 4. binarize with Otsu's automatic threshold
//!
//! - `thresholding`: Otsu histogram thresholding
//! - `types`: shared result and error types

pub mod thresholding;
pub mod types;

use image::ImageFormat;
use tracing::{debug, info};

use crate::ocr_config::OcrConfig;

pub use thresholding::{apply_otsu_threshold, luminance_histogram, otsu_threshold};
pub use types::{BinarizedReceipt, PreprocessingError, ThresholdedImageResult};

/// Validate receipt bytes before decoding and return the sniffed format.
///
/// Empty buffers and buffers above the configured limits are rejected with
/// `PreprocessingError::Validation`; bytes that are not a known image format
/// are rejected with `PreprocessingError::Decode`.
pub fn validate_receipt_bytes(
    bytes: &[u8],
    config: &OcrConfig,
) -> Result<ImageFormat, PreprocessingError> {
    let size = bytes.len() as u64;

    if size == 0 {
        return Err(PreprocessingError::Validation {
            message: "receipt image is empty".to_string(),
        });
    }

    if size > config.format_limits.min_quick_reject {
        return Err(PreprocessingError::Validation {
            message: format!(
                "{} bytes exceeds quick reject threshold of {} bytes",
                size, config.format_limits.min_quick_reject
            ),
        });
    }

    if bytes.len() < config.min_format_bytes {
        return Err(PreprocessingError::Decode {
            message: format!(
                "only {} bytes, need at least {} to detect the format",
                bytes.len(),
                config.min_format_bytes
            ),
        });
    }

    let head = &bytes[..bytes.len().min(config.buffer_size)];
    let format = image::guess_format(head).map_err(|e| PreprocessingError::Decode {
        message: format!("unrecognized image format: {}", e),
    })?;

    let limit = config.size_limit_for(format).ok_or_else(|| PreprocessingError::Decode {
        message: format!("unsupported image format {:?}", format),
    })?;

    if size > limit {
        return Err(PreprocessingError::Validation {
            message: format!(
                "image too large for {:?} format: {} bytes (maximum allowed: {} bytes)",
                format, size, limit
            ),
        });
    }

    debug!(format = ?format, size_bytes = size, "Receipt bytes validated");
    Ok(format)
}

/// Decode, convert to luminance and binarize a receipt photo.
///
/// # Examples
///
/// ```
/// use smart_receipt::ocr_config::OcrConfig;
/// use smart_receipt::preprocessing::{preprocess_receipt, PreprocessingError};
///
/// let err = preprocess_receipt(b"definitely not an image", &OcrConfig::default()).unwrap_err();
/// assert!(matches!(err, PreprocessingError::Decode { .. }));
/// ```
pub fn preprocess_receipt(
    bytes: &[u8],
    config: &OcrConfig,
) -> Result<BinarizedReceipt, PreprocessingError> {
    let format = validate_receipt_bytes(bytes, config)?;

    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        PreprocessingError::Decode {
            message: e.to_string(),
        }
    })?;

    let gray = decoded.to_luma8();
    let thresholded = apply_otsu_threshold(&gray)?;

    info!(
        format = ?format,
        width = gray.width(),
        height = gray.height(),
        threshold = thresholded.threshold,
        elapsed_ms = thresholded.processing_time_ms,
        "Receipt preprocessed"
    );

    Ok(BinarizedReceipt {
        image: thresholded.image,
        source_format: format,
        threshold: thresholded.threshold,
    })
}
