//! # Field Extraction Engine
//!
//! Chooses between the heuristic and the model strategies and always returns
//! a guess. The model answer wins when one is available; the combined mode
//! fills the fields the model left out from the heuristic guess.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::ai::{CompletionProvider, FallbackOutcome, GeminiProvider, ModelFallback};
use crate::errors::{AppError, AppResult};
use crate::heuristics::HeuristicExtractor;
use crate::observability;
use crate::receipt::{ExtractedText, FieldGuess};
use crate::response_parser::{parse_fields, parse_response};

/// Which strategy produces field guesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionStrategy {
    #[default]
    Heuristic,
    Ai,
    /// Model first, heuristic for whatever the model missed or when every model failed
    AiWithHeuristicFallback,
}

impl ExtractionStrategy {
    /// Parse `heuristic`, `ai` or `combined`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Some(ExtractionStrategy::Heuristic),
            "ai" => Some(ExtractionStrategy::Ai),
            "combined" => Some(ExtractionStrategy::AiWithHeuristicFallback),
            _ => None,
        }
    }

    pub fn requires_model(&self) -> bool {
        !matches!(self, ExtractionStrategy::Heuristic)
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtractionStrategy::Heuristic => "heuristic",
            ExtractionStrategy::Ai => "ai",
            ExtractionStrategy::AiWithHeuristicFallback => "combined",
        })
    }
}

/// Where a guess came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GuessSource {
    Heuristic,
    Model { id: String },
    /// Nothing usable was available; every field is a placeholder
    Defaults,
}

impl GuessSource {
    fn metric_label(&self) -> &'static str {
        match self {
            GuessSource::Heuristic => "heuristic",
            GuessSource::Model { .. } => "model",
            GuessSource::Defaults => "defaults",
        }
    }
}

/// A guess with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct GuessResult {
    pub guess: FieldGuess,
    pub source: GuessSource,
    /// Model answer, or the exhaustion sentinel, when a model was asked
    pub raw_response: Option<String>,
}

pub struct ExtractionEngine<P = GeminiProvider> {
    strategy: ExtractionStrategy,
    heuristic: HeuristicExtractor,
    ai: Option<ModelFallback<P>>,
}

impl<P: CompletionProvider> ExtractionEngine<P> {
    /// # Errors
    ///
    /// `AppError::Config` when the strategy needs a model and none is given.
    pub fn new(
        strategy: ExtractionStrategy,
        heuristic: HeuristicExtractor,
        ai: Option<ModelFallback<P>>,
    ) -> AppResult<Self> {
        if strategy.requires_model() && ai.is_none() {
            return Err(AppError::Config(format!(
                "the '{}' extraction strategy needs a model provider (set GEMINI_API_KEY)",
                strategy
            )));
        }
        Ok(Self {
            strategy,
            heuristic,
            ai,
        })
    }

    pub fn heuristic_only(heuristic: HeuristicExtractor) -> Self {
        Self {
            strategy: ExtractionStrategy::Heuristic,
            heuristic,
            ai: None,
        }
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    /// Produce a guess for `text`. Never fails.
    pub async fn guess(&self, text: &ExtractedText) -> GuessResult {
        let result = match (self.strategy, &self.ai) {
            (ExtractionStrategy::Heuristic, _) | (_, None) => self.heuristic_guess(text),
            (ExtractionStrategy::Ai, Some(ai)) => self.model_guess(ai, text).await,
            (ExtractionStrategy::AiWithHeuristicFallback, Some(ai)) => {
                self.combined_guess(ai, text).await
            }
        };

        observability::record_guess_source(result.source.metric_label());
        info!(
            strategy = %self.strategy,
            source = ?result.source,
            merchant = %result.guess.merchant,
            amount = %result.guess.amount,
            "Field guess ready"
        );
        result
    }

    fn heuristic_guess(&self, text: &ExtractedText) -> GuessResult {
        let source = if text.is_empty() {
            GuessSource::Defaults
        } else {
            GuessSource::Heuristic
        };
        GuessResult {
            guess: self.heuristic.extract(text),
            source,
            raw_response: None,
        }
    }

    async fn model_guess(&self, ai: &ModelFallback<P>, text: &ExtractedText) -> GuessResult {
        if text.is_empty() {
            return defaults();
        }

        match ai.ask(text).await {
            FallbackOutcome::Answered { model, text, .. } => GuessResult {
                guess: parse_fields(&text),
                source: GuessSource::Model { id: model },
                raw_response: Some(text),
            },
            exhausted @ FallbackOutcome::Exhausted { .. } => {
                let sentinel = exhausted.into_text();
                GuessResult {
                    guess: parse_fields(&sentinel),
                    source: GuessSource::Defaults,
                    raw_response: Some(sentinel),
                }
            }
        }
    }

    async fn combined_guess(&self, ai: &ModelFallback<P>, text: &ExtractedText) -> GuessResult {
        if text.is_empty() {
            return defaults();
        }

        let heuristic = self.heuristic.extract(text);
        match ai.ask(text).await {
            FallbackOutcome::Answered { model, text, .. } => GuessResult {
                guess: parse_response(&text).merge_with(&heuristic),
                source: GuessSource::Model { id: model },
                raw_response: Some(text),
            },
            exhausted @ FallbackOutcome::Exhausted { .. } => GuessResult {
                guess: heuristic,
                source: GuessSource::Heuristic,
                raw_response: Some(exhausted.into_text()),
            },
        }
    }
}

fn defaults() -> GuessResult {
    GuessResult {
        guess: FieldGuess::placeholder(),
        source: GuessSource::Defaults,
        raw_response: None,
    }
}
