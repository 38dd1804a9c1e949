//! # Receipt Pipeline
//!
//! Wires text extraction and field extraction together for one receipt and
//! drives a [`ReceiptSession`] up to the point where the user reviews the
//! guess.

use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::{CompletionProvider, GeminiProvider};
use crate::engine::{ExtractionEngine, GuessResult};
use crate::errors::{AppError, AppResult};
use crate::ocr::{self, ExtractionOutcome, NoTextReason, TextRecognizer};
use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;
use crate::receipt::{ExtractedText, RawReceiptImage};
use crate::session::ReceiptSession;

/// What processing a receipt produced
#[derive(Debug, Clone)]
pub struct ProcessedReceipt {
    pub guess: GuessResult,
    /// Set when the photo yielded no text and the guess is all placeholders
    pub no_text: Option<NoTextReason>,
}

pub struct ReceiptPipeline<P = GeminiProvider> {
    ocr_config: OcrConfig,
    recognizer: Arc<dyn TextRecognizer>,
    engine: ExtractionEngine<P>,
}

impl<P: CompletionProvider> ReceiptPipeline<P> {
    pub fn new(
        ocr_config: OcrConfig,
        recognizer: Arc<dyn TextRecognizer>,
        engine: ExtractionEngine<P>,
    ) -> Self {
        Self {
            ocr_config,
            recognizer,
            engine,
        }
    }

    pub fn engine(&self) -> &ExtractionEngine<P> {
        &self.engine
    }

    pub fn ocr_config(&self) -> &OcrConfig {
        &self.ocr_config
    }

    /// Run preprocessing and recognition on one photo.
    ///
    /// # Errors
    ///
    /// `OcrError::Initialization` when no recognition engine is available.
    pub async fn extract_text(&self, image: &RawReceiptImage) -> Result<ExtractionOutcome, OcrError> {
        ocr::extract_text(image, &self.ocr_config, Arc::clone(&self.recognizer)).await
    }

    /// Like [`ReceiptPipeline::extract_text`], with "no text" folded into empty text.
    pub async fn extract_text_or_empty(&self, image: &RawReceiptImage) -> Result<ExtractedText, OcrError> {
        Ok(self.extract_text(image).await?.into_text())
    }

    pub async fn guess(&self, text: &ExtractedText) -> GuessResult {
        self.engine.guess(text).await
    }

    /// Process a new upload and leave `session` awaiting confirmation.
    ///
    /// A receipt already pending in the session is discarded first. When
    /// recognition is unavailable the session is left `Discarded` and the
    /// error is returned.
    pub async fn process(
        &self,
        session: &mut ReceiptSession,
        image: RawReceiptImage,
    ) -> AppResult<ProcessedReceipt> {
        session.upload(image.len());

        let outcome = match self.extract_text(&image).await {
            Ok(outcome) => outcome,
            Err(err) => {
                session.discard()?;
                return Err(AppError::from(err));
            }
        };

        let no_text = match &outcome {
            ExtractionOutcome::NoText(reason) => {
                warn!(reason = ?reason, "Receipt yielded no text; guess will be placeholders");
                Some(reason.clone())
            }
            ExtractionOutcome::Extracted(_) => None,
        };

        let text = outcome.into_text();
        session.record_text(text.clone())?;

        let guess = self.engine.guess(&text).await;
        session.record_guess(guess.clone())?;
        session.await_confirmation()?;

        info!(
            source = ?guess.source,
            no_text = no_text.is_some(),
            "Receipt ready for review"
        );
        Ok(ProcessedReceipt { guess, no_text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GuessSource;
    use crate::heuristics::HeuristicExtractor;
    use crate::session::ReceiptState;
    use image::GrayImage;

    struct Unavailable;

    impl TextRecognizer for Unavailable {
        fn recognize(&self, _image: &GrayImage) -> Result<Vec<String>, OcrError> {
            Err(OcrError::Initialization("no tessdata".to_string()))
        }
    }

    fn pipeline(recognizer: Arc<dyn TextRecognizer>) -> ReceiptPipeline {
        ReceiptPipeline::new(
            OcrConfig::default(),
            recognizer,
            ExtractionEngine::heuristic_only(HeuristicExtractor::default()),
        )
    }

    #[tokio::test]
    async fn test_undecodable_upload_awaits_confirmation_with_placeholders() {
        let pipeline = pipeline(Arc::new(Unavailable));
        let mut session = ReceiptSession::new();
        let image = RawReceiptImage::new(b"definitely not an image".to_vec(), None);

        let processed = pipeline.process(&mut session, image).await.unwrap();
        assert!(matches!(processed.no_text, Some(NoTextReason::Undecodable(_))));
        assert_eq!(processed.guess.source, GuessSource::Defaults);
        assert!(session.pending_guess().is_some());
    }

    #[tokio::test]
    async fn test_extract_text_or_empty_folds_no_text() {
        let pipeline = pipeline(Arc::new(Unavailable));
        let image = RawReceiptImage::new(Vec::new(), None);
        let text = pipeline.extract_text_or_empty(&image).await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_recognizer_discards_session() {
        let pipeline = pipeline(Arc::new(Unavailable));
        let mut session = ReceiptSession::new();
        let mut png = Vec::new();
        GrayImage::from_pixel(4, 4, image::Luma([200]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let result = pipeline
            .process(&mut session, RawReceiptImage::new(png, Some("image/png".to_string())))
            .await;
        assert!(matches!(result, Err(AppError::Ocr(_))));
        assert_eq!(session.state(), &ReceiptState::Discarded);
    }
}
