//! # Test Helper Library
//!
//! Fake recognizers and model providers so the pipeline can be exercised
//! without Tesseract or network access.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use parking_lot::Mutex;
use smart_receipt::ai::{CompletionProvider, ModelCallError};
use smart_receipt::ocr::TextRecognizer;
use smart_receipt::ocr_errors::OcrError;
use smart_receipt::RawReceiptImage;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

/// Recognizer that returns the same fragments for every image
pub struct ScriptedRecognizer(pub Vec<String>);

impl ScriptedRecognizer {
    pub fn new(fragments: &[&str]) -> Arc<Self> {
        Arc::new(Self(fragments.iter().map(|s| s.to_string()).collect()))
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<String>, OcrError> {
        Ok(self.0.clone())
    }
}

/// Provider answering per model id and recording the order of calls.
/// Models without a scripted reply answer `NotFound`.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: HashMap<String, Result<String, ModelCallError>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn reply(mut self, model: &str, reply: Result<&str, ModelCallError>) -> Self {
        self.replies
            .insert(model.to_string(), reply.map(str::to_string));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl CompletionProvider for ScriptedProvider {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, ModelCallError> {
        self.calls.lock().push(model.to_string());
        self.replies
            .get(model)
            .cloned()
            .unwrap_or_else(|| Err(ModelCallError::NotFound(model.to_string())))
    }
}

/// A small striped PNG that decodes and binarizes cleanly
pub fn receipt_png() -> RawReceiptImage {
    let img = GrayImage::from_fn(32, 32, |_, y| Luma([if y % 8 < 3 { 20 } else { 235 }]));
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encoding test image should succeed");
    RawReceiptImage::new(bytes, Some("image/png".to_string()))
}
