use crate::processing::Stage;
use crate::summarization::SummaryStrategy;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    pages_extracted: AtomicU64,
    failed_ingest: AtomicU64,
    failed_extract: AtomicU64,
    failed_validate: AtomicU64,
    failed_embed: AtomicU64,
    failed_summarize: AtomicU64,
    checks_failed: AtomicU64,
    remote_summaries: AtomicU64,
    local_summaries: AtomicU64,
    summary_fallbacks: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document that completed every stage.
    pub fn record_success(
        &self,
        pages: u64,
        failed_checks: u64,
        strategy: SummaryStrategy,
        fell_back: bool,
    ) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.pages_extracted.fetch_add(pages, Ordering::Relaxed);
        self.checks_failed
            .fetch_add(failed_checks, Ordering::Relaxed);
        match strategy {
            SummaryStrategy::Remote => self.remote_summaries.fetch_add(1, Ordering::Relaxed),
            SummaryStrategy::Local => self.local_summaries.fetch_add(1, Ordering::Relaxed),
        };
        if fell_back {
            self.summary_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a document that stopped at `stage`.
    pub fn record_failure(&self, stage: Stage) {
        let counter = match stage {
            Stage::Ingest => &self.failed_ingest,
            Stage::Extract => &self.failed_extract,
            Stage::Validate => &self.failed_validate,
            Stage::Embed => &self.failed_embed,
            Stage::Summarize => &self.failed_summarize,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let failures = FailureCounts {
            ingest: self.failed_ingest.load(Ordering::Relaxed),
            extract: self.failed_extract.load(Ordering::Relaxed),
            validate: self.failed_validate.load(Ordering::Relaxed),
            embed: self.failed_embed.load(Ordering::Relaxed),
            summarize: self.failed_summarize.load(Ordering::Relaxed),
        };
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_failed: failures.total(),
            failures,
            pages_extracted: self.pages_extracted.load(Ordering::Relaxed),
            checks_failed: self.checks_failed.load(Ordering::Relaxed),
            remote_summaries: self.remote_summaries.load(Ordering::Relaxed),
            local_summaries: self.local_summaries.load(Ordering::Relaxed),
            summary_fallbacks: self.summary_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Failed documents by the stage that stopped them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FailureCounts {
    /// Inputs that could not be read.
    pub ingest: u64,
    /// Extraction failures.
    pub extract: u64,
    /// Validation failures.
    pub validate: u64,
    /// Embedding failures.
    pub embed: u64,
    /// Summarization failures.
    pub summarize: u64,
}

impl FailureCounts {
    fn total(&self) -> u64 {
        self.ingest + self.extract + self.validate + self.embed + self.summarize
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that completed every stage since startup.
    pub documents_processed: u64,
    /// Documents that stopped at some stage.
    pub documents_failed: u64,
    /// Failed documents broken down by stage.
    pub failures: FailureCounts,
    /// Non-empty pages extracted from completed documents.
    pub pages_extracted: u64,
    /// Failed QA/template checks across completed documents.
    pub checks_failed: u64,
    /// Summaries produced by the remote strategy.
    pub remote_summaries: u64,
    /// Summaries produced by the local strategy.
    pub local_summaries: u64,
    /// Local summaries produced after a remote failure.
    pub summary_fallbacks: u64,
}
