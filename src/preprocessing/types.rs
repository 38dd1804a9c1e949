//! # Shared Types for Receipt Preprocessing

use image::{GrayImage, ImageFormat};

/// Errors that can occur while turning receipt bytes into a binary image.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Bytes rejected before decoding (empty, too large)
    Validation { message: String },
    /// Bytes are not a supported image
    Decode { message: String },
    /// Image processing operation failed
    ProcessingFailed { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::Validation { message } => {
                write!(f, "Receipt image rejected: {}", message)
            }
            PreprocessingError::Decode { message } => {
                write!(f, "Failed to decode receipt image: {}", message)
            }
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// Binary image: ink is 0, background is 255
    pub image: GrayImage,
    /// Optimal threshold value found by Otsu's method
    pub threshold: u8,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// A receipt ready for text recognition.
#[derive(Debug, Clone)]
pub struct BinarizedReceipt {
    /// Binary image with the same dimensions as the decoded photo
    pub image: GrayImage,
    /// Format detected from the magic bytes
    pub source_format: ImageFormat,
    /// Threshold chosen for this photo
    pub threshold: u8,
}

impl BinarizedReceipt {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
