//! # OCR Configuration Module
//!
//! Configuration structures for receipt OCR: recognition language and model,
//! byte-level size limits, timeouts, and the bound on text passed downstream.

use image::ImageFormat;

use crate::errors::{AppError, AppResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "spa";
pub const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
pub const MIN_FORMAT_BYTES: usize = 8;
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB cap across all formats
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 4000;

/// Format-specific file size limits for different image formats
#[derive(Debug, Clone)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to better compression)
    pub png_max: u64,
    /// JPEG format limit (phone cameras)
    pub jpeg_max: u64,
    /// BMP format limit (lower due to uncompressed nature)
    pub bmp_max: u64,
    /// TIFF format limit (scanners)
    pub tiff_max: u64,
    /// WEBP format limit
    pub webp_max: u64,
    /// Size above which bytes are rejected without sniffing
    pub min_quick_reject: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,          // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024,         // 10MB for JPEG
            bmp_max: 5 * 1024 * 1024,           // 5MB for BMP
            tiff_max: 20 * 1024 * 1024,         // 20MB for TIFF
            webp_max: 10 * 1024 * 1024,         // 10MB for WEBP
            min_quick_reject: 50 * 1024 * 1024, // 50MB quick reject
        }
    }
}

impl FormatSizeLimits {
    /// Validate format size limits
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("png_max", self.png_max),
            ("jpeg_max", self.jpeg_max),
            ("bmp_max", self.bmp_max),
            ("tiff_max", self.tiff_max),
            ("webp_max", self.webp_max),
            ("min_quick_reject", self.min_quick_reject),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.bmp_max > self.png_max {
            return Err(AppError::Config(format!(
                "bmp_max ({}) should not exceed png_max ({})",
                self.bmp_max, self.png_max
            )));
        }
        if self.jpeg_max > self.png_max {
            return Err(AppError::Config(format!(
                "jpeg_max ({}) should not exceed png_max ({})",
                self.jpeg_max, self.png_max
            )));
        }

        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text (most till receipts)
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }

    /// Parse a mode name (`auto`, `column`, `block`, `sparse`) or its Tesseract number
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" | "3" => Some(PageSegMode::Auto),
            "column" | "4" => Some(PageSegMode::SingleColumn),
            "block" | "6" => Some(PageSegMode::SingleBlock),
            "sparse" | "11" => Some(PageSegMode::SparseText),
            _ => None,
        }
    }
}

/// Tesseract model type for different accuracy/speed trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ModelType {
    /// Fast model (tessdata_fast) - faster processing, lower accuracy
    #[default]
    Fast,
    /// Best model (tessdata_best) - slower processing, higher accuracy
    Best,
}

impl ModelType {
    /// Get the tessdata directory name for this model type
    pub fn tessdata_dir(&self) -> &'static str {
        match self {
            ModelType::Fast => "tessdata_fast",
            ModelType::Best => "tessdata_best",
        }
    }

    /// Parse `fast` / `best`, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fast" => Some(ModelType::Fast),
            "best" => Some(ModelType::Best),
            _ => None,
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "spa", "spa+eng")
    pub languages: String,
    /// Tesseract model type (Fast vs Best accuracy)
    pub model_type: ModelType,
    /// Explicit tessdata directory; searched in standard locations when `None`
    pub tessdata_dir: Option<String>,
    /// Buffer size for format detection in bytes
    pub buffer_size: usize,
    /// Minimum bytes required for format detection
    pub min_format_bytes: usize,
    /// Cap in bytes for every format; format limits above it are lowered to it
    pub max_file_size: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
    /// Timeout for one recognition call in seconds
    pub operation_timeout_secs: u64,
    /// Page segmentation mode set on the Tesseract handle
    pub psm_mode: PageSegMode,
    /// Character whitelist restricting OCR output to receipt characters
    pub character_whitelist: Option<String>,
    /// Upper bound on normalized text handed to field extraction
    pub max_text_chars: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            model_type: ModelType::default(),
            tessdata_dir: None,
            buffer_size: FORMAT_DETECTION_BUFFER_SIZE,
            min_format_bytes: MIN_FORMAT_BYTES,
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            psm_mode: PageSegMode::default(),
            character_whitelist: Some("0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyzÁÉÍÓÚÑÜáéíóúñü$.,:-/&#%() ".to_string()),
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
        }
    }
}

impl OcrConfig {
    /// Size limit for a sniffed format, or `None` when the format is not accepted
    pub fn size_limit_for(&self, format: ImageFormat) -> Option<u64> {
        let format_max = match format {
            ImageFormat::Png => self.format_limits.png_max,
            ImageFormat::Jpeg => self.format_limits.jpeg_max,
            ImageFormat::Bmp => self.format_limits.bmp_max,
            ImageFormat::Tiff => self.format_limits.tiff_max,
            ImageFormat::WebP => self.format_limits.webp_max,
            _ => return None,
        };
        Some(format_max.min(self.max_file_size))
    }

    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }

        if self.buffer_size == 0 {
            return Err(AppError::Config(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes == 0 {
            return Err(AppError::Config(
                "min_format_bytes must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes > self.buffer_size {
            return Err(AppError::Config(format!(
                "min_format_bytes ({}) cannot exceed buffer_size ({})",
                self.min_format_bytes, self.buffer_size
            )));
        }

        if self.max_file_size == 0 {
            return Err(AppError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }

        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_text_chars == 0 {
            return Err(AppError::Config(
                "max_text_chars must be greater than 0".to_string(),
            ));
        }

        self.format_limits.validate()?;

        Ok(())
    }
}
