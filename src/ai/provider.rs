//! Text-completion providers.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::ModelCallError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// A hosted model that turns a prompt into text.
///
/// One call is one attempt; retrying and switching models is the caller's job.
pub trait CompletionProvider: Send + Sync {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelCallError>> + Send;
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiProvider {
    /// Build a client. The HTTP timeout is a backstop; the per-model budget is
    /// enforced by the fallback.
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, ModelCallError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ModelCallError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl CompletionProvider for GeminiProvider {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelCallError> {
        let body = serde_json::json!({
            "contents": [
                {"parts": [{"text": prompt}]}
            ]
        });

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelCallError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message: String = message.chars().take(300).collect();
            return Err(match status.as_u16() {
                404 => ModelCallError::NotFound(model.to_string()),
                429 => ModelCallError::Quota(message),
                code => ModelCallError::Http {
                    status: code,
                    message,
                },
            });
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Network(format!("invalid response body: {}", e)))?;

        let text = extract_reply_text(reply).ok_or(ModelCallError::EmptyResponse)?;
        debug!(model = %model, reply_chars = text.chars().count(), "Model replied");
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate, if any are non-blank
fn extract_reply_text(reply: GenerateContentResponse) -> Option<String> {
    let content = reply.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<String>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reply_text() {
        let reply: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Comercio: OXXO\n"},{"text":"Monto: 45.50"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            extract_reply_text(reply).as_deref(),
            Some("Comercio: OXXO\nMonto: 45.50")
        );
    }

    #[test]
    fn test_blocked_reply_has_no_text() {
        let reply: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(extract_reply_text(reply), None);

        let reply: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(extract_reply_text(reply), None);
    }

    #[test]
    fn test_endpoint_uses_model_id() {
        let provider = GeminiProvider::new(
            "test-key".to_string(),
            Some("http://localhost:8080/".to_string()),
        )
        .unwrap();
        assert_eq!(
            provider.endpoint("gemini-1.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
