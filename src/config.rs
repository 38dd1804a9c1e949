//! # Unified Application Configuration
//!
//! Consolidates OCR, model and observability settings into one object loaded
//! from environment variables and validated at startup.

use crate::engine::ExtractionStrategy;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::{ModelType, OcrConfig, PageSegMode};
use std::env;
use std::time::Duration;

pub const DEFAULT_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 15;
const MAX_AI_TIMEOUT_SECS: u64 = 120;

/// Generative model settings
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Gemini API key; only required when the strategy uses a model
    pub api_key: Option<String>,
    /// Model ids tried in order
    pub models: Vec<String>,
    /// Per-model call timeout in seconds
    pub timeout_secs: u64,
    /// Whether the prompt asks for an `Ubicacion` line
    pub request_location: bool,
    /// Override of the API base URL
    pub base_url: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
            request_location: true,
            base_url: None,
        }
    }
}

impl AiConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Validate model configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.models.iter().all(|m| m.trim().is_empty()) {
            return Err(AppError::Config("AI_MODELS cannot be empty".to_string()));
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_AI_TIMEOUT_SECS {
            return Err(AppError::Config(format!(
                "AI_TIMEOUT_SECS must be between 1 and {} seconds",
                MAX_AI_TIMEOUT_SECS
            )));
        }

        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::Config(
                    "AI_BASE_URL must start with 'http://' or 'https://'".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// OCR processing configuration
    pub ocr: OcrConfig,
    /// Generative model configuration
    pub ai: AiConfig,
    /// Field extraction strategy
    pub strategy: ExtractionStrategy,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // OCR configuration
        if let Ok(languages) = env::var("OCR_LANGUAGES") {
            config.ocr.languages = languages;
        }
        config.ocr.operation_timeout_secs = parse_var(
            "OCR_TIMEOUT_SECS",
            config.ocr.operation_timeout_secs,
        )?;
        if let Ok(model) = env::var("OCR_MODEL_TYPE") {
            config.ocr.model_type = ModelType::from_name(&model).ok_or_else(|| {
                config_error("OCR_MODEL_TYPE", format!("OCR_MODEL_TYPE must be 'fast' or 'best', got '{}'", model))
            })?;
        }
        if let Ok(psm) = env::var("OCR_PSM") {
            config.ocr.psm_mode = PageSegMode::from_name(&psm).ok_or_else(|| {
                config_error(
                    "OCR_PSM",
                    format!("OCR_PSM must be 'auto', 'column', 'block' or 'sparse', got '{}'", psm),
                )
            })?;
        }
        config.ocr.max_file_size =
            parse_var("OCR_MAX_FILE_MB", config.ocr.max_file_size / (1024 * 1024))?
                .saturating_mul(1024 * 1024);
        config.ocr.tessdata_dir = non_empty_var("TESSDATA_DIR");

        // Model configuration
        config.ai.api_key = non_empty_var("GEMINI_API_KEY");
        if let Some(models) = non_empty_var("AI_MODELS") {
            config.ai.models = parse_model_list(&models);
        }
        config.ai.timeout_secs = parse_var("AI_TIMEOUT_SECS", config.ai.timeout_secs)?;
        config.ai.request_location = env::var("AI_REQUEST_LOCATION")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);
        config.ai.base_url = non_empty_var("AI_BASE_URL");

        if let Ok(strategy) = env::var("EXTRACTION_STRATEGY") {
            config.strategy = ExtractionStrategy::from_name(&strategy).ok_or_else(|| {
                config_error(
                    "EXTRACTION_STRATEGY",
                    format!(
                        "EXTRACTION_STRATEGY must be 'heuristic', 'ai' or 'combined', got '{}'",
                        strategy
                    ),
                )
            })?;
        }

        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.ocr.validate()?;
        self.ai.validate()?;
        self.observability.validate().map_err(AppError::Config)?;

        if self.strategy.requires_model() && !self.ai.has_api_key() {
            return Err(AppError::Config(format!(
                "GEMINI_API_KEY is required for the '{}' extraction strategy",
                self.strategy
            )));
        }

        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: strategy={}, gemini_api_key={}, models={}, ai_timeout_secs={}, ocr_languages={}, environment={}",
            self.strategy,
            if self.ai.has_api_key() { "[REDACTED]" } else { "[NOT SET]" },
            self.ai.models.join(","),
            self.ai.timeout_secs,
            self.ocr.languages,
            self.observability.environment
        )
    }
}

/// Split a comma-separated model list, dropping blanks
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| config_error(key, format!("{} must be a valid number", key))),
        Err(_) => Ok(default),
    }
}

fn config_error(key: &str, message: String) -> AppError {
    error_logging::log_config_error(&message, key, "load_config");
    AppError::Config(message)
}
