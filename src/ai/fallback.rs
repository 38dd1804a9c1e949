//! Ordered model fallback.
//!
//! Model ids come and go on hosted providers. The fallback keeps an ordered
//! list and gives each model exactly one attempt under a fixed time budget,
//! moving to the next on any failure. Exhausting the list is an outcome, not
//! an error.

use std::time::{Duration, Instant};

use tracing::{info, Instrument};

use super::prompt::build_prompt;
use super::provider::CompletionProvider;
use super::ModelCallError;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability;
use crate::receipt::ExtractedText;

/// Text handed to the parser when no model answered
pub const EXHAUSTED_SENTINEL: &str = "Error: ningún modelo disponible";

/// A failed attempt against one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAttempt {
    pub model: String,
    pub error: ModelCallError,
}

/// Result of walking the model list
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    /// A model answered. `failed` lists the models tried before it.
    Answered {
        model: String,
        text: String,
        failed: Vec<ModelAttempt>,
    },
    /// Every model failed, in list order
    Exhausted { attempts: Vec<ModelAttempt> },
}

impl FallbackOutcome {
    pub fn model(&self) -> Option<&str> {
        match self {
            FallbackOutcome::Answered { model, .. } => Some(model),
            FallbackOutcome::Exhausted { .. } => None,
        }
    }

    /// The answer text, or the sentinel when exhausted
    pub fn into_text(self) -> String {
        match self {
            FallbackOutcome::Answered { text, .. } => text,
            FallbackOutcome::Exhausted { .. } => EXHAUSTED_SENTINEL.to_string(),
        }
    }
}

/// Ordered list of models sharing one provider.
#[derive(Debug, Clone)]
pub struct ModelFallback<P> {
    provider: P,
    models: Vec<String>,
    call_timeout: Duration,
    request_location: bool,
}

impl<P: CompletionProvider> ModelFallback<P> {
    /// # Errors
    ///
    /// `AppError::Config` for an empty model list or a zero timeout.
    pub fn new(provider: P, models: Vec<String>, call_timeout: Duration) -> AppResult<Self> {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(AppError::Config("model list cannot be empty".to_string()));
        }
        if call_timeout.is_zero() {
            return Err(AppError::Config(
                "model call timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            provider,
            models,
            call_timeout,
            request_location: true,
        })
    }

    /// Whether the prompt asks for the `Ubicacion` line
    pub fn with_location(mut self, request_location: bool) -> Self {
        self.request_location = request_location;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Send `prompt` to each model in order until one answers.
    pub async fn complete(&self, prompt: &str) -> FallbackOutcome {
        let mut failed = Vec::new();

        for (index, model) in self.models.iter().enumerate() {
            let span = observability::ai_span("generate", model);
            let start = Instant::now();

            let result = tokio::time::timeout(self.call_timeout, self.provider.generate(model, prompt))
                .instrument(span)
                .await
                .unwrap_or_else(|_| {
                    Err(ModelCallError::Timeout {
                        model: model.clone(),
                        timeout_secs: self.call_timeout.as_secs_f64(),
                    })
                });
            let result = result.and_then(|text| {
                if text.trim().is_empty() {
                    Err(ModelCallError::EmptyResponse)
                } else {
                    Ok(text)
                }
            });

            match result {
                Ok(text) => {
                    observability::record_model_attempt(model, "success", start.elapsed());
                    info!(
                        model = %model,
                        attempt = index + 1,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Model answered"
                    );
                    return FallbackOutcome::Answered {
                        model: model.clone(),
                        text,
                        failed,
                    };
                }
                Err(error) => {
                    observability::record_model_attempt(model, error.kind(), start.elapsed());
                    error_logging::log_model_attempt_failure(
                        &error,
                        model,
                        index + 1,
                        self.models.len() - index - 1,
                    );
                    failed.push(ModelAttempt {
                        model: model.clone(),
                        error,
                    });
                }
            }
        }

        error_logging::log_model_list_exhausted(&self.models);
        FallbackOutcome::Exhausted { attempts: failed }
    }

    /// Ask the model list to extract fields from receipt text
    pub async fn ask(&self, text: &ExtractedText) -> FallbackOutcome {
        let prompt = build_prompt(text.as_str(), self.request_location);
        self.complete(&prompt).await
    }

    /// Raw model answer for receipt text; the sentinel when every model failed
    pub async fn guess_fields_ai(&self, text: &ExtractedText) -> String {
        self.ask(text).await.into_text()
    }
}
