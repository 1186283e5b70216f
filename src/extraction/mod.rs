//! Text extraction: turn a document's raw bytes into cleaned pages.
//!
//! PDFs go through poppler's `pdftotext`, office formats are first rendered to PDF with a headless
//! LibreOffice, and plain text is decoded directly. Raw bytes are staged in a per-call temp
//! directory so concurrent documents never share files.

mod clean;
mod tools;

pub use tools::tool_available;

use crate::config::Config;
use crate::processing::types::{Document, ExtractedText, Page, SourceKind};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tools::run_tool;

const PDF_MAGIC: &[u8] = b"%PDF-";
const PAGE_BREAK: char = '\u{000c}';

/// Errors raised while converting a document to text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document has no bytes.
    #[error("document is empty (0 bytes)")]
    EmptyInput,
    /// The bytes are not a readable document of the declared type.
    #[error("document is corrupt: {0}")]
    Corrupt(String),
    /// The file type is not handled by any converter.
    #[error("unsupported document type: {0}")]
    UnsupportedFormat(String),
    /// The external converter could not be started.
    #[error("external tool '{tool}' could not be started: {source}")]
    ToolMissing {
        /// Program that failed to spawn.
        tool: String,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The external converter exited unsuccessfully.
    #[error("external tool '{tool}' failed (exit status {status:?}): {stderr}")]
    ToolFailed {
        /// Program that failed.
        tool: String,
        /// Exit code, when the process was not killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// The external converter did not finish in time.
    #[error("external tool '{tool}' timed out after {after:?}")]
    Timeout {
        /// Program that was killed.
        tool: String,
        /// Configured limit.
        after: Duration,
    },
    /// Conversion succeeded but yielded no text (typically a scanned document).
    #[error("{0} has no extractable text; it appears to be scanned only")]
    NoText(String),
    /// Staging files for the converter failed.
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts documents to text through external tooling.
#[derive(Debug, Clone)]
pub struct Extractor {
    pdftotext_bin: String,
    soffice_bin: String,
    timeout: Duration,
}

impl Extractor {
    /// Build an extractor from explicit tool paths and a per-invocation timeout.
    pub fn new(
        pdftotext_bin: impl Into<String>,
        soffice_bin: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            pdftotext_bin: pdftotext_bin.into(),
            soffice_bin: soffice_bin.into(),
            timeout,
        }
    }

    /// Build an extractor using the configured tool paths.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pdftotext_bin.clone(),
            config.soffice_bin.clone(),
            config.extraction_timeout,
        )
    }

    /// Configured `pdftotext` program.
    pub fn pdftotext_bin(&self) -> &str {
        &self.pdftotext_bin
    }

    /// Configured `soffice` program.
    pub fn soffice_bin(&self) -> &str {
        &self.soffice_bin
    }

    /// Extract cleaned, non-empty pages from `document`.
    pub async fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractionError> {
        if document.bytes().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let raw_pages = match document.kind() {
            SourceKind::Pdf => {
                if !document.bytes().starts_with(PDF_MAGIC) {
                    return Err(ExtractionError::Corrupt(format!(
                        "{} does not start with a PDF header",
                        document.file_name()
                    )));
                }
                let staging = tempfile::tempdir()?;
                let pdf_path = stage_bytes(staging.path(), document)?;
                self.pdf_to_pages(&pdf_path).await?
            }
            SourceKind::Office => {
                let staging = tempfile::tempdir()?;
                let source_path = stage_bytes(staging.path(), document)?;
                let pdf_path = self.office_to_pdf(&source_path, staging.path()).await?;
                self.pdf_to_pages(&pdf_path).await?
            }
            SourceKind::PlainText => vec![String::from_utf8_lossy(document.bytes()).into_owned()],
            SourceKind::Unsupported => {
                return Err(ExtractionError::UnsupportedFormat(
                    document.file_name().to_string(),
                ));
            }
        };

        let total = raw_pages.len();
        let mut pages = Vec::with_capacity(total);
        for (index, raw) in raw_pages.iter().enumerate() {
            let number = index as u32 + 1;
            let text = clean::clean_page(raw);
            if text.is_empty() {
                tracing::warn!(
                    doc_id = document.id(),
                    page = number,
                    "Page has no extractable text"
                );
                continue;
            }
            pages.push(Page { number, text });
        }

        let extracted = ExtractedText::from_pages(pages)
            .ok_or_else(|| ExtractionError::NoText(document.file_name().to_string()))?;
        tracing::debug!(
            doc_id = document.id(),
            pages = extracted.pages().len(),
            skipped = total - extracted.pages().len(),
            "Extracted document text"
        );
        Ok(extracted)
    }

    async fn pdf_to_pages(&self, pdf_path: &Path) -> Result<Vec<String>, ExtractionError> {
        let output = run_tool(
            &self.pdftotext_bin,
            [
                OsStr::new("-enc"),
                OsStr::new("UTF-8"),
                OsStr::new("-eol"),
                OsStr::new("unix"),
                pdf_path.as_os_str(),
                OsStr::new("-"),
            ],
            self.timeout,
        )
        .await?;
        Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn office_to_pdf(
        &self,
        source_path: &Path,
        out_dir: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        let convert_dir = out_dir.join("converted");
        std::fs::create_dir_all(&convert_dir)?;
        run_tool(
            &self.soffice_bin,
            [
                OsStr::new("--headless"),
                OsStr::new("--norestore"),
                OsStr::new("--convert-to"),
                OsStr::new("pdf"),
                OsStr::new("--outdir"),
                convert_dir.as_os_str(),
                source_path.as_os_str(),
            ],
            self.timeout,
        )
        .await?;

        let stem = source_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("document");
        let pdf_path = convert_dir.join(format!("{stem}.pdf"));
        if !pdf_path.exists() {
            return Err(ExtractionError::ToolFailed {
                tool: self.soffice_bin.clone(),
                status: Some(0),
                stderr: format!("no PDF produced for {}", source_path.display()),
            });
        }
        Ok(pdf_path)
    }
}

/// Write the document bytes under `dir`, keeping the original file name for the converters.
fn stage_bytes(dir: &Path, document: &Document) -> Result<PathBuf, ExtractionError> {
    let path = dir.join(sanitize_file_name(document.file_name()));
    std::fs::write(&path, document.bytes())?;
    Ok(path)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Split `pdftotext` output into pages on form feeds, dropping the trailing empty segment.
fn split_pages(output: &str) -> Vec<String> {
    let mut pages: Vec<String> = output.split(PAGE_BREAK).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }
    pages
}
