//! Bounded-length document summaries.
//!
//! Two strategies share one interface: a local TextRank ranker and a hosted chat model. The
//! strategy is chosen once per run by [`Summarizer::select`]; the remote strategy falls back to
//! the local one when a call fails, so a run only errors when neither can produce text. Every
//! summary is capped at the configured word budget, itself never above
//! [`MAX_SUMMARY_WORDS`](crate::config::MAX_SUMMARY_WORDS).

pub mod extractive;
pub mod remote;
pub mod tokenizer;

pub use extractive::TextRankSummarizer;
pub use remote::{
    OpenAiChatClient, SummarizationClient, SummarizationClientError, SummarizationRequest,
};
pub use tokenizer::{TokenizerData, TokenizerDataError};

use crate::config::{Config, MAX_SUMMARY_WORDS};
use crate::text::{count_words, truncate_words};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the summarization stage.
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// Neither strategy could produce a summary.
    #[error("no summarization strategy succeeded (remote: {remote}; local: {local})")]
    Exhausted {
        /// Why the remote strategy did not produce text.
        remote: String,
        /// Why the local strategy did not produce text.
        local: String,
    },
}

/// Strategy that produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStrategy {
    /// Local extractive ranking.
    Local,
    /// Hosted generative model.
    Remote,
}

impl SummaryStrategy {
    /// Stable label used in logs and health output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// A summary of at most the configured number of words.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Summary text.
    pub text: String,
    /// Strategy that produced the text.
    pub strategy: SummaryStrategy,
    /// Remote model identifier, when the remote strategy produced the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Whitespace-delimited word count of `text`.
    pub word_count: usize,
    /// Why the selected remote strategy was bypassed for this document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl Summary {
    fn new(text: String, strategy: SummaryStrategy, model: Option<String>) -> Self {
        let word_count = count_words(&text);
        Self {
            text,
            strategy,
            model,
            word_count,
            fallback_reason: None,
        }
    }
}

#[derive(Clone)]
enum Engine {
    Local,
    Remote(Arc<dyn SummarizationClient>),
}

/// Summarization stage with its strategy fixed at construction.
#[derive(Clone)]
pub struct Summarizer {
    engine: Engine,
    local: Option<Arc<TextRankSummarizer>>,
    max_words: usize,
    prompt_template: Option<String>,
}

impl Summarizer {
    /// Local-only summarizer.
    pub fn local(local: TextRankSummarizer, max_words: usize) -> Self {
        Self::build(Engine::Local, Some(local), max_words, None)
    }

    /// Choose the strategy from configuration: remote when a credential is set and the provider
    /// answers the reachability probe, local otherwise.
    pub async fn select(config: &Config, local: Option<TextRankSummarizer>) -> Self {
        let client = match config.openai_api_key.as_deref() {
            None => {
                tracing::info!("No remote credential configured; using local summarizer");
                None
            }
            Some(api_key) => match OpenAiChatClient::new(
                config.openai_base_url.clone(),
                api_key,
                config.summarization_model.clone(),
                config.remote_timeout,
            ) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn SummarizationClient>),
                Err(error) => {
                    tracing::warn!(error = %error, "Failed to build remote summarization client");
                    None
                }
            },
        };
        Self::select_with(
            client,
            local,
            config.summarization_max_words,
            config.summarization_prompt.clone(),
        )
        .await
    }

    /// Choose the strategy given an optional remote client.
    pub async fn select_with(
        client: Option<Arc<dyn SummarizationClient>>,
        local: Option<TextRankSummarizer>,
        max_words: usize,
        prompt_template: Option<String>,
    ) -> Self {
        let engine = match client {
            Some(client) => match client.probe().await {
                Ok(()) => {
                    tracing::info!(model = client.model(), "Using remote summarizer");
                    Engine::Remote(client)
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "Remote summarizer unreachable; using local summarizer"
                    );
                    Engine::Local
                }
            },
            None => Engine::Local,
        };
        Self::build(engine, local, max_words, prompt_template)
    }

    fn build(
        engine: Engine,
        local: Option<TextRankSummarizer>,
        max_words: usize,
        prompt_template: Option<String>,
    ) -> Self {
        Self {
            engine,
            local: local.map(Arc::new),
            max_words: max_words.clamp(1, MAX_SUMMARY_WORDS),
            prompt_template,
        }
    }

    /// Strategy selected for this run.
    pub fn strategy(&self) -> SummaryStrategy {
        match &self.engine {
            Engine::Local => SummaryStrategy::Local,
            Engine::Remote(_) => SummaryStrategy::Remote,
        }
    }

    /// Word cap applied to every summary.
    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Whether the local fallback is available.
    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Summarize `text`. Blank input yields an empty local summary.
    pub async fn summarize(&self, text: &str) -> Result<Summary, SummarizationError> {
        if text.trim().is_empty() {
            return Ok(Summary::new(String::new(), SummaryStrategy::Local, None));
        }

        let remote_failure = match &self.engine {
            Engine::Local => None,
            Engine::Remote(client) => match self.summarize_remote(client.as_ref(), text).await {
                Ok(summary) => return Ok(summary),
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        "Remote summarization failed; falling back to local summarizer"
                    );
                    Some(error.to_string())
                }
            },
        };

        let Some(local) = &self.local else {
            return Err(SummarizationError::Exhausted {
                remote: remote_failure.unwrap_or_else(|| "not selected".to_string()),
                local: "tokenizer data package unavailable".to_string(),
            });
        };

        // TextRank is CPU-bound; keep it off the async workers.
        let ranker = Arc::clone(local);
        let owned = text.to_owned();
        let max_words = self.max_words;
        let ranked = tokio::task::spawn_blocking(move || ranker.summarize(&owned, max_words))
            .await
            .map_err(|error| SummarizationError::Exhausted {
                remote: remote_failure
                    .clone()
                    .unwrap_or_else(|| "not selected".to_string()),
                local: format!("local summarizer task failed: {error}"),
            })?;

        let mut summary = Summary::new(ranked, SummaryStrategy::Local, None);
        summary.fallback_reason = remote_failure;
        Ok(summary)
    }

    async fn summarize_remote(
        &self,
        client: &dyn SummarizationClient,
        text: &str,
    ) -> Result<Summary, SummarizationClientError> {
        let request = SummarizationRequest {
            system_prompt: remote::system_prompt(self.prompt_template.as_deref(), self.max_words),
            text: remote::trim_to_chars(text, remote::MAX_INPUT_CHARS),
            max_words: self.max_words,
        };
        let generated = client.generate_summary(request).await?;
        Ok(Summary::new(
            truncate_words(&generated, self.max_words),
            SummaryStrategy::Remote,
            Some(client.model().to_string()),
        ))
    }
}
