//! Pipeline service coordinating extraction, validation, embedding, and summarization.

use crate::{
    config::Config,
    embedding::Embedder,
    extraction::{Extractor, tool_available},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::types::{
        BatchEntry, Document, DocumentInfo, DocumentReport, HealthReport, PipelineError,
    },
    setup::{ConfigurationError, ToolStatus, load_tokenizer},
    summarization::{Summarizer, SummaryStrategy, TextRankSummarizer},
    validation::{ChecklistPolicy, Validator},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::Instrument;

/// Runs each document through Extractor, Validator, Embedder, and Summarizer in that order.
///
/// The stages are long-lived: the summarization strategy is fixed when the pipeline is built and
/// HTTP clients are shared across documents. Construct the pipeline once near process start and
/// share it through an `Arc`.
pub struct Pipeline {
    extractor: Extractor,
    validator: Validator,
    embedder: Embedder,
    summarizer: Summarizer,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Process one ingested document end to end.
    async fn process_document(&self, document: Document)
    -> Result<DocumentReport, PipelineError>;

    /// Probe the pipeline's external dependencies.
    async fn health(&self) -> HealthReport;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl Pipeline {
    /// Assemble a pipeline from already-built stages.
    pub fn new(
        extractor: Extractor,
        validator: Validator,
        embedder: Embedder,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            extractor,
            validator,
            embedder,
            summarizer,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build every stage from configuration and select the summarization strategy.
    ///
    /// The tokenizer data package is required unless the remote summarizer was selected; in that
    /// case its absence only disables the local fallback.
    pub async fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let policy = ChecklistPolicy::load_or_bundled(config.checklist_path.as_deref())?;
        tracing::info!(
            questions = policy.questions.len(),
            source = %config
                .checklist_path
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "bundled".to_string()),
            "Loaded checklist policy"
        );

        let embedder = Embedder::from_config(config)?;
        tracing::info!(
            provider = config.embedding_provider.as_str(),
            model = %config.embedding_model,
            dimension = config.embedding_dimension,
            "Embedding client initialized"
        );

        let tokenizer = load_tokenizer(config);
        let local = tokenizer
            .as_ref()
            .ok()
            .cloned()
            .map(TextRankSummarizer::new);
        let summarizer = Summarizer::select(config, local).await;
        if let Err(error) = tokenizer {
            if summarizer.strategy() == SummaryStrategy::Local {
                return Err(error);
            }
            tracing::warn!(
                error = %error,
                "Tokenizer data package unavailable; remote failures will not fall back"
            );
        }

        Ok(Self::new(
            Extractor::from_config(config),
            Validator::new(policy).with_semantic(embedder.clone()),
            embedder,
            summarizer,
        ))
    }

    /// Summarization strategy selected for this run.
    pub fn strategy(&self) -> SummaryStrategy {
        self.summarizer.strategy()
    }

    /// Shared metrics registry.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Process one document. A failing stage ends the run for this document.
    pub async fn process(&self, document: Document) -> Result<DocumentReport, PipelineError> {
        let span = tracing::info_span!(
            "document",
            doc_id = %document.id(),
            source = %document.source()
        );
        let result = self.run_stages(&document).instrument(span).await;
        match &result {
            Ok(report) => self.metrics.record_success(
                report.pages.len() as u64,
                report.validation.failed_checks().len() as u64,
                report.summary.strategy,
                report.summary.fallback_reason.is_some(),
            ),
            Err(error) => {
                tracing::warn!(
                    doc_id = %document.id(),
                    stage = %error.stage(),
                    error = %error,
                    "Document failed"
                );
                self.metrics.record_failure(error.stage());
            }
        }
        result
    }

    /// Read `path` and process it.
    pub async fn process_path(&self, path: &Path) -> Result<DocumentReport, PipelineError> {
        let document = match Document::from_path(path).await {
            Ok(document) => document,
            Err(source) => {
                let error = PipelineError::Ingest {
                    path: path.to_path_buf(),
                    source,
                };
                tracing::warn!(path = %path.display(), error = %error, "Document failed");
                self.metrics.record_failure(error.stage());
                return Err(error);
            }
        };
        self.process(document).await
    }

    /// Process `paths` one after another. A failed document is recorded and the batch continues.
    pub async fn process_batch(&self, paths: &[PathBuf]) -> Vec<BatchEntry> {
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let outcome = self.process_path(path).await;
            entries.push(BatchEntry {
                path: path.clone(),
                outcome,
            });
        }
        let failed = entries.iter().filter(|entry| entry.outcome.is_err()).count();
        tracing::info!(
            total = entries.len(),
            succeeded = entries.len() - failed,
            failed,
            "Batch complete"
        );
        entries
    }

    async fn run_stages(&self, document: &Document) -> Result<DocumentReport, PipelineError> {
        let started = Instant::now();

        let extracted = self.extractor.extract(document).await?;
        tracing::info!(
            stage = "extract",
            pages = extracted.pages().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extracted text"
        );

        let validation = self.validator.check(extracted.pages()).await?;
        tracing::info!(
            stage = "validate",
            pathway = ?validation.pathway,
            passed = validation.passed_count(),
            total = validation.checks.len(),
            "Validated text"
        );

        let text = extracted.full_text();
        let embedding = self.embedder.embed(&text).await?;
        tracing::info!(
            stage = "embed",
            model = %embedding.model,
            chunks = embedding.chunk_count,
            "Embedded text"
        );

        let summary = self.summarizer.summarize(&text).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            stage = "summarize",
            strategy = summary.strategy.as_str(),
            words = summary.word_count,
            elapsed_ms,
            "Document processed"
        );

        Ok(DocumentReport {
            document: DocumentInfo::from(document),
            processed_at: current_timestamp_rfc3339(),
            elapsed_ms,
            pages: extracted.pages().to_vec(),
            text,
            validation,
            embedding,
            summary,
        })
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[async_trait]
impl PipelineApi for Pipeline {
    async fn process_document(
        &self,
        document: Document,
    ) -> Result<DocumentReport, PipelineError> {
        self.process(document).await
    }

    async fn health(&self) -> HealthReport {
        let pdftotext = ToolStatus {
            tool: self.extractor.pdftotext_bin().to_string(),
            available: tool_available(self.extractor.pdftotext_bin(), "-v").await,
        };
        let soffice = ToolStatus {
            tool: self.extractor.soffice_bin().to_string(),
            available: tool_available(self.extractor.soffice_bin(), "--version").await,
        };
        HealthReport {
            ready: pdftotext.available,
            pdftotext,
            soffice,
            summary_strategy: self.summarizer.strategy(),
            local_summarizer: self.summarizer.has_local(),
            embedding_model: self.embedder.model().to_string(),
            embedding_dimension: self.embedder.dimension(),
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
