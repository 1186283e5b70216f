//! Core data types and error definitions for the processing pipeline.

use crate::{
    embedding::{EmbeddingError, EmbeddingVector},
    extraction::ExtractionError,
    setup::ToolStatus,
    summarization::{SummarizationError, Summary, SummaryStrategy},
    validation::{ValidationError, ValidationResult},
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conversion route chosen for a document, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Portable Document Format, converted with `pdftotext`.
    Pdf,
    /// Word processor formats, converted to PDF through LibreOffice first.
    Office,
    /// Already plain text.
    PlainText,
    /// Anything else; rejected by the extractor.
    Unsupported,
}

impl SourceKind {
    /// Classify a file name by extension.
    pub fn from_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("doc" | "docx" | "odt" | "rtf") => Self::Office,
            Some("txt" | "text" | "md") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    /// Whether documents of this kind can be processed at all.
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// A source document as ingested: identity plus immutable raw bytes.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    source: String,
    kind: SourceKind,
    content_sha256: String,
    bytes: Vec<u8>,
}

impl Document {
    /// Wrap raw bytes received under `source` (a file name, path or URI).
    pub fn from_bytes(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        let source = source.into();
        let kind = SourceKind::from_name(&source);
        let content_sha256 = hex::encode(Sha256::digest(&bytes));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            kind,
            content_sha256,
            bytes,
        }
    }

    /// Read a document from disk.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(path.display().to_string(), bytes))
    }

    /// Generated identifier, unique per ingestion.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source path or identifier supplied at ingestion.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// File name portion of the source, used to name temp files and reports.
    pub fn file_name(&self) -> &str {
        Path::new(&self.source)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.source)
    }

    /// Detected conversion route.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Hex-encoded SHA-256 digest of the raw bytes.
    pub fn content_sha256(&self) -> &str {
        &self.content_sha256
    }

    /// Raw bytes as received.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// One page of cleaned, non-empty extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number in the source document.
    pub number: u32,
    /// Cleaned page text.
    pub text: String,
}

/// Extractor output: at least one page of non-empty text.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedText {
    pages: Vec<Page>,
}

impl ExtractedText {
    /// Build from pages, dropping blank ones. Returns `None` when nothing remains.
    pub fn from_pages(pages: Vec<Page>) -> Option<Self> {
        let pages: Vec<Page> = pages
            .into_iter()
            .filter(|page| !page.text.trim().is_empty())
            .collect();
        if pages.is_empty() {
            None
        } else {
            Some(Self { pages })
        }
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Page texts joined by newlines.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Pipeline stage names used in logs, errors and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the input from disk.
    Ingest,
    /// Converting the document to text.
    Extract,
    /// Running QA/template checks.
    Validate,
    /// Computing the embedding vector.
    Embed,
    /// Producing the summary.
    Summarize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ingest => "ingest",
            Self::Extract => "extract",
            Self::Validate => "validate",
            Self::Embed => "embed",
            Self::Summarize => "summarize",
        };
        f.write_str(name)
    }
}

/// Errors emitted by the document processing pipeline, one variant per stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input could not be read.
    #[error("Failed to read {path}: {source}")]
    Ingest {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Text extraction failed.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// QA checks could not be evaluated.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Embedding generation failed.
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Both summarization strategies failed.
    #[error("Summarization failed: {0}")]
    Summarization(#[from] SummarizationError),
}

impl PipelineError {
    /// Stage that produced the error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Ingest { .. } => Stage::Ingest,
            Self::Extraction(_) => Stage::Extract,
            Self::Validation(_) => Stage::Validate,
            Self::Embedding(_) => Stage::Embed,
            Self::Summarization(_) => Stage::Summarize,
        }
    }
}

/// Metadata describing the processed source.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    /// Generated document identifier.
    pub id: String,
    /// Source path or identifier.
    pub source: String,
    /// Detected conversion route.
    pub kind: SourceKind,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub content_sha256: String,
    /// Raw size in bytes.
    pub size_bytes: usize,
}

impl From<&Document> for DocumentInfo {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id().to_string(),
            source: document.source().to_string(),
            kind: document.kind(),
            content_sha256: document.content_sha256().to_string(),
            size_bytes: document.bytes().len(),
        }
    }
}

/// Output bundle for one successfully processed document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Source metadata.
    pub document: DocumentInfo,
    /// RFC3339 timestamp taken when processing finished.
    pub processed_at: String,
    /// Wall-clock processing time in milliseconds.
    pub elapsed_ms: u64,
    /// Extracted pages.
    pub pages: Vec<Page>,
    /// Page texts joined by newlines.
    pub text: String,
    /// QA/template check results.
    pub validation: ValidationResult,
    /// Document embedding.
    pub embedding: EmbeddingVector,
    /// Bounded-length summary.
    pub summary: Summary,
}

/// Result of one document inside a batch run.
#[derive(Debug)]
pub struct BatchEntry {
    /// Input path.
    pub path: PathBuf,
    /// Report or the stage error that stopped this document.
    pub outcome: Result<DocumentReport, PipelineError>,
}

/// Readiness of the pipeline's external dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Whether PDFs can currently be processed.
    pub ready: bool,
    /// poppler `pdftotext` status.
    pub pdftotext: ToolStatus,
    /// LibreOffice `soffice` status.
    pub soffice: ToolStatus,
    /// Summarization strategy selected for this run.
    pub summary_strategy: SummaryStrategy,
    /// Whether the local summarizer (tokenizer data package) is available.
    pub local_summarizer: bool,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Embedding vector length.
    pub embedding_dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_follows_extension() {
        assert_eq!(SourceKind::from_name("K240287.PDF"), SourceKind::Pdf);
        assert_eq!(SourceKind::from_name("notes.docx"), SourceKind::Office);
        assert_eq!(SourceKind::from_name("notes.txt"), SourceKind::PlainText);
        assert_eq!(SourceKind::from_name("image.png"), SourceKind::Unsupported);
        assert_eq!(SourceKind::from_name("no_extension"), SourceKind::Unsupported);
    }

    #[test]
    fn document_records_digest_and_file_name() {
        let document = Document::from_bytes("/tmp/uploads/K240287.pdf", b"abc".to_vec());
        assert_eq!(document.file_name(), "K240287.pdf");
        assert_eq!(
            document.content_sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(document.kind(), SourceKind::Pdf);
    }

    #[test]
    fn extracted_text_requires_a_non_empty_page() {
        assert!(ExtractedText::from_pages(vec![]).is_none());
        assert!(
            ExtractedText::from_pages(vec![Page {
                number: 1,
                text: "   ".into()
            }])
            .is_none()
        );

        let text = ExtractedText::from_pages(vec![
            Page {
                number: 1,
                text: "first".into(),
            },
            Page {
                number: 2,
                text: "".into(),
            },
            Page {
                number: 3,
                text: "third".into(),
            },
        ])
        .expect("text");
        assert_eq!(text.pages().len(), 2);
        assert_eq!(text.full_text(), "first\nthird");
    }
}
