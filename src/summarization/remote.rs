//! Hosted LLM summaries over an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Prompt sent when `SUMMARIZATION_PROMPT` is not set. `{max_words}` is substituted.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an FDA document analyst. Provide an accurate, neutral summary of no more than {max_words} words.";

/// Longest input, in characters, forwarded to the model.
pub const MAX_INPUT_CHARS: usize = 16_000;

const OMISSION_MARKER: &str = "\n\n[...omitted...]\n\n";
const TEMPERATURE: f64 = 0.3;

/// Errors surfaced while attempting remote summarization.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider was unreachable or rejected the credential.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the summarization provider.
#[derive(Debug, Clone)]
pub struct SummarizationRequest {
    /// System prompt with the word budget already substituted.
    pub system_prompt: String,
    /// Document text, already trimmed to [`MAX_INPUT_CHARS`].
    pub text: String,
    /// Word budget requested by the caller.
    pub max_words: usize,
}

/// Interface implemented by remote summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate a summary for the request.
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;

    /// Check that the provider is reachable and accepts the credential.
    async fn probe(&self) -> Result<(), SummarizationClientError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}

/// Render the system prompt for `max_words`.
pub fn system_prompt(template: Option<&str>, max_words: usize) -> String {
    template
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace("{max_words}", &max_words.to_string())
}

/// Keep the head and tail of `text` when it exceeds `max_chars` characters.
pub fn trim_to_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(total - half).collect();
    format!("{head}{OMISSION_MARKER}{tail}")
}

/// Chat completions client for OpenAI-compatible endpoints.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Build a client for `model` at `base_url`, authenticating with `api_key`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("fda-pipeline/summary")
            .timeout(timeout)
            .build()
            .map_err(|error| SummarizationClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

fn status_error(status: StatusCode, body: String) -> SummarizationClientError {
    let message = format!("OpenAI returned {status}: {body}");
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
    {
        SummarizationClientError::ProviderUnavailable(message)
    } else {
        SummarizationClientError::GenerationFailed(message)
    }
}

#[async_trait]
impl SummarizationClient for OpenAiChatClient {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.text },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": request.max_words * 2,
        });

        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode chat response: {error}"
            ))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(SummarizationClientError::InvalidResponse(
                "chat response contained no summary text".into(),
            ));
        }
        Ok(content)
    }

    async fn probe(&self) -> Result<(), SummarizationClientError> {
        let response = self
            .http
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SummarizationClientError::ProviderUnavailable(format!(
                "OpenAI returned {status}: {body}"
            )))
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };

    fn client(server: &MockServer) -> OpenAiChatClient {
        OpenAiChatClient::new(
            server.base_url(),
            "test-key",
            "gpt-4o",
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn prompt_substitutes_word_budget() {
        assert_eq!(
            system_prompt(None, 250),
            "You are an FDA document analyst. Provide an accurate, neutral summary of no more than 250 words."
        );
        assert_eq!(
            system_prompt(Some("Summarize in {max_words} words."), 80),
            "Summarize in 80 words."
        );
    }

    #[test]
    fn trimming_keeps_head_and_tail() {
        let text = format!("{}{}", "a".repeat(10), "b".repeat(10));
        let trimmed = trim_to_chars(&text, 8);
        assert_eq!(trimmed, format!("aaaa{OMISSION_MARKER}bbbb"));
        assert_eq!(trim_to_chars("short", 8), "short");
    }

    #[tokio::test]
    async fn sends_chat_request_and_reads_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{"model": "gpt-4o", "temperature": 0.3, "max_tokens": 200}"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "  A summary.  " } }]
                }));
            })
            .await;

        let summary = client(&server)
            .generate_summary(SummarizationRequest {
                system_prompt: system_prompt(None, 100),
                text: "Document".into(),
                max_words: 100,
            })
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "A summary.");
    }

    #[tokio::test]
    async fn server_errors_are_generation_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client(&server)
            .generate_summary(SummarizationRequest {
                system_prompt: "p".into(),
                text: "t".into(),
                max_words: 10,
            })
            .await
            .expect_err("error response");
        assert!(
            matches!(error, SummarizationClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn probe_reports_rejected_credential() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/models");
                then.status(401).body("invalid key");
            })
            .await;

        let error = client(&server).probe().await.expect_err("probe fails");
        assert!(matches!(
            error,
            SummarizationClientError::ProviderUnavailable(_)
        ));
    }
}
