//! # Generative Model Extraction
//!
//! Field extraction through a hosted text-completion model.
//!
//! - `provider`: the [`CompletionProvider`] seam and the Gemini HTTP client
//! - `prompt`: the fixed-shape Spanish prompt
//! - `fallback`: the ordered model list, one bounded attempt per model

pub mod fallback;
pub mod prompt;
pub mod provider;

use std::fmt;

pub use fallback::{FallbackOutcome, ModelAttempt, ModelFallback, EXHAUSTED_SENTINEL};
pub use prompt::build_prompt;
pub use provider::{CompletionProvider, GeminiProvider};

/// Failure of a single call to a single model.
///
/// Every variant makes the fallback move on to the next model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCallError {
    /// The model id is unknown to the provider (deprecated or misspelled)
    NotFound(String),
    /// Quota or rate limit exhausted
    Quota(String),
    /// Connection, DNS or body transfer failure
    Network(String),
    /// No answer within the call budget
    Timeout { model: String, timeout_secs: f64 },
    /// The provider answered without any text
    EmptyResponse,
    /// Any other non-success HTTP status
    Http { status: u16, message: String },
}

impl ModelCallError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ModelCallError::NotFound(_) => "not_found",
            ModelCallError::Quota(_) => "quota",
            ModelCallError::Network(_) => "network",
            ModelCallError::Timeout { .. } => "timeout",
            ModelCallError::EmptyResponse => "empty_response",
            ModelCallError::Http { .. } => "http",
        }
    }
}

impl fmt::Display for ModelCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelCallError::NotFound(model) => write!(f, "[MODEL_NOT_FOUND] Model '{}' is not available", model),
            ModelCallError::Quota(msg) => write!(f, "[MODEL_QUOTA] Quota exceeded: {}", msg),
            ModelCallError::Network(msg) => write!(f, "[MODEL_NETWORK] Request failed: {}", msg),
            ModelCallError::Timeout { model, timeout_secs } => {
                write!(f, "[MODEL_TIMEOUT] Model '{}' did not answer within {}s", model, timeout_secs)
            }
            ModelCallError::EmptyResponse => write!(f, "[MODEL_EMPTY] Model returned no text"),
            ModelCallError::Http { status, message } => {
                write!(f, "[MODEL_HTTP] Provider returned status {}: {}", status, message)
            }
        }
    }
}

impl std::error::Error for ModelCallError {}
