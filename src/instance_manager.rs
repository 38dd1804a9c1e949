//! # OCR Instance Manager Module
//!
//! Owns the process's Tesseract instance. Creating a Tesseract handle loads
//! the trained language data (hundreds of milliseconds), so it is built
//! lazily on first use and reused for every later recognition.
//!
//! The manager is an ordinary value: the binary builds one, wraps it in an
//! `Arc` and hands it to the recognizer. Nothing looks it up globally.

use leptess::LepTess;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::ocr_config::{ModelType, OcrConfig};
use crate::ocr_errors::OcrError;

/// Lazily-built, shared Tesseract instance.
///
/// Tesseract needs `&mut` access to run recognition, so the handle sits
/// behind a mutex; the manager itself is never mutated after the handle is
/// built.
pub struct OcrInstanceManager {
    config: OcrConfig,
    instance: OnceCell<Arc<Mutex<LepTess>>>,
    init_attempts: AtomicUsize,
}

impl OcrInstanceManager {
    /// Create a manager for the given configuration. No Tesseract work happens here.
    ///
    /// ```rust
    /// use smart_receipt::instance_manager::OcrInstanceManager;
    /// use smart_receipt::ocr_config::OcrConfig;
    ///
    /// let manager = OcrInstanceManager::new(OcrConfig::default());
    /// assert!(!manager.is_initialized());
    /// ```
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            instance: OnceCell::new(),
            init_attempts: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    /// How many times construction ran, successful or not
    pub fn init_attempts(&self) -> usize {
        self.init_attempts.load(Ordering::SeqCst)
    }

    /// Get the shared Tesseract handle, creating it on first call.
    ///
    /// # Errors
    ///
    /// `OcrError::Initialization` when Tesseract cannot load the configured
    /// language data. This is the "recognition unavailable" condition and is
    /// meant to be reported, not retried silently. Nothing is stored on
    /// failure, so a later call tries again.
    ///
    /// Concurrent first calls block until one construction finishes.
    pub fn get_instance(&self) -> Result<Arc<Mutex<LepTess>>, OcrError> {
        self.instance
            .get_or_try_init(|| {
                self.init_attempts.fetch_add(1, Ordering::SeqCst);
                Self::create_instance(&self.config).map(|tess| Arc::new(Mutex::new(tess)))
            })
            .map(Arc::clone)
    }

    fn create_instance(config: &OcrConfig) -> Result<LepTess, OcrError> {
        info!(
            languages = %config.languages,
            model = config.model_type.tessdata_dir(),
            "Creating Tesseract instance"
        );

        let tessdata_path = config
            .tessdata_dir
            .clone()
            .or_else(|| Self::get_tessdata_path(config.model_type));

        let mut tess = LepTess::new(tessdata_path.as_deref(), &config.languages).map_err(|e| {
            OcrError::Initialization(format!(
                "failed to initialize Tesseract for '{}': {}",
                config.languages, e
            ))
        })?;

        tess.set_variable(
            leptess::Variable::TesseditPagesegMode,
            config.psm_mode.as_str(),
        )
        .map_err(|e| OcrError::Initialization(format!("failed to set PSM mode: {}", e)))?;

        if let Some(whitelist) = &config.character_whitelist {
            tess.set_variable(leptess::Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| {
                    OcrError::Initialization(format!("failed to set character whitelist: {}", e))
                })?;
        }

        Ok(tess)
    }

    /// Standard tessdata locations for the model type, first existing one wins
    fn get_tessdata_path(model_type: ModelType) -> Option<String> {
        let possible_paths = match model_type {
            ModelType::Fast => [
                "/usr/share/tesseract-ocr/5/tessdata_fast",
                "/usr/share/tesseract-ocr/4.00/tessdata_fast",
                "/usr/share/tessdata_fast",
                "/usr/local/share/tessdata_fast",
            ],
            ModelType::Best => [
                "/usr/share/tesseract-ocr/5/tessdata_best",
                "/usr/share/tesseract-ocr/4.00/tessdata_best",
                "/usr/share/tessdata_best",
                "/usr/local/share/tessdata_best",
            ],
        };

        let found = possible_paths
            .iter()
            .find(|path| std::path::Path::new(path).exists())
            .map(|path| path.to_string());

        match &found {
            Some(path) => info!(path = %path, "Using tessdata path"),
            None => info!(model = ?model_type, "No model-specific tessdata path found, using default"),
        }
        found
    }
}
