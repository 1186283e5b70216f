//! One-time setup and environment checks.
//!
//! The pipeline depends on things outside the binary: poppler and LibreOffice executables, the
//! tokenizer data package, and optionally a remote credential. This module installs what can be
//! installed and reports what is missing with an actionable message.

use crate::config::{Config, ConfigError};
use crate::embedding::EmbeddingClientError;
use crate::extraction::tool_available;
use crate::summarization::{TokenizerData, TokenizerDataError, tokenizer::PACKAGE_FILE};
use crate::validation::PolicyError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Problems with the runtime environment rather than with a document.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required external tool is not installed.
    #[error("required tool '{tool}' was not found; install it or set {variable}")]
    MissingTool {
        /// Tool name or configured path.
        tool: String,
        /// Variable that overrides the tool path.
        variable: &'static str,
    },
    /// The tokenizer data package has not been installed.
    #[error(
        "tokenizer data package not found at {}; run `fda-process setup` once to install it",
        path.display()
    )]
    MissingDataPackage {
        /// Expected package path.
        path: PathBuf,
    },
    /// The tokenizer data package exists but cannot be used.
    #[error("{0}; run `fda-process setup` to reinstall it")]
    InvalidDataPackage(TokenizerDataError),
    /// Installing the tokenizer data package failed.
    #[error("failed to install tokenizer data package into {}: {source}", path.display())]
    Install {
        /// Target directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The QA checklist policy could not be loaded.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// An environment variable is missing or malformed.
    #[error(transparent)]
    Environment(#[from] ConfigError),
    /// The configured embedding provider cannot be constructed.
    #[error("embedding provider misconfigured: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

impl From<TokenizerDataError> for ConfigurationError {
    fn from(error: TokenizerDataError) -> Self {
        match error {
            TokenizerDataError::Missing { path } => Self::MissingDataPackage { path },
            other => Self::InvalidDataPackage(other),
        }
    }
}

/// Load the installed tokenizer data package.
pub fn load_tokenizer(config: &Config) -> Result<TokenizerData, ConfigurationError> {
    Ok(TokenizerData::load(&config.tokenizer_data_dir)?)
}

/// Install the bundled tokenizer data package into `dir`.
pub fn install_tokenizer(dir: &Path) -> Result<PathBuf, ConfigurationError> {
    let path = TokenizerData::install(dir).map_err(|source| ConfigurationError::Install {
        path: dir.to_path_buf(),
        source,
    })?;
    // Read back so a broken install surfaces here rather than on first use.
    TokenizerData::load(dir)?;
    tracing::info!(path = %path.display(), "Installed tokenizer data package");
    Ok(path)
}

/// Availability of one external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    /// Configured tool name or path.
    pub tool: String,
    /// Whether the tool could be started.
    pub available: bool,
}

/// State of the tokenizer data package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageStatus {
    /// Expected package path.
    pub path: PathBuf,
    /// Whether the package loaded.
    pub installed: bool,
    /// Load error, when not installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of everything the pipeline needs from its surroundings.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    /// poppler `pdftotext`.
    pub pdftotext: ToolStatus,
    /// LibreOffice `soffice`, needed only for office documents.
    pub soffice: ToolStatus,
    /// Tokenizer data package for the local summarizer.
    pub tokenizer: PackageStatus,
    /// Whether a remote credential is configured. The credential itself is never reported.
    pub credential_configured: bool,
    /// Embedding provider label.
    pub embedding_provider: String,
    /// Embedding model identifier.
    pub embedding_model: String,
}

impl EnvironmentReport {
    /// Whether PDFs can be processed end to end.
    pub fn is_ready(&self) -> bool {
        self.ensure_ready().is_ok()
    }

    /// First blocking problem as a typed error: a missing `pdftotext`, or no summarizer
    /// available because the data package is absent and no credential is set.
    pub fn ensure_ready(&self) -> Result<(), ConfigurationError> {
        if !self.pdftotext.available {
            return Err(ConfigurationError::MissingTool {
                tool: self.pdftotext.tool.clone(),
                variable: "PDFTOTEXT_BIN",
            });
        }
        if !self.tokenizer.installed && !self.credential_configured {
            return Err(ConfigurationError::MissingDataPackage {
                path: self.tokenizer.path.clone(),
            });
        }
        Ok(())
    }

    /// Human-readable problems, one per line item.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.pdftotext.available {
            problems.push(
                ConfigurationError::MissingTool {
                    tool: self.pdftotext.tool.clone(),
                    variable: "PDFTOTEXT_BIN",
                }
                .to_string(),
            );
        }
        if !self.soffice.available {
            problems.push(format!(
                "{} (office documents only)",
                ConfigurationError::MissingTool {
                    tool: self.soffice.tool.clone(),
                    variable: "SOFFICE_BIN",
                }
            ));
        }
        if let Some(error) = &self.tokenizer.error {
            problems.push(error.clone());
        }
        problems
    }
}

/// Probe tools and data packages named by `config`.
pub async fn check_environment(config: &Config) -> EnvironmentReport {
    let pdftotext = ToolStatus {
        tool: config.pdftotext_bin.clone(),
        available: tool_available(&config.pdftotext_bin, "-v").await,
    };
    let soffice = ToolStatus {
        tool: config.soffice_bin.clone(),
        available: tool_available(&config.soffice_bin, "--version").await,
    };
    let tokenizer = match load_tokenizer(config) {
        Ok(_) => PackageStatus {
            path: config.tokenizer_data_dir.join(PACKAGE_FILE),
            installed: true,
            error: None,
        },
        Err(error) => PackageStatus {
            path: config.tokenizer_data_dir.join(PACKAGE_FILE),
            installed: false,
            error: Some(error.to_string()),
        },
    };

    EnvironmentReport {
        pdftotext,
        soffice,
        tokenizer,
        credential_configured: config.has_remote_credential(),
        embedding_provider: config.embedding_provider.as_str().to_string(),
        embedding_model: config.embedding_model.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(dir: &Path, pdftotext: &str) -> Config {
        let dir = dir.display().to_string();
        let pdftotext = pdftotext.to_string();
        Config::from_lookup(move |key| match key {
            "TOKENIZER_DATA_DIR" => Some(dir.clone()),
            "PDFTOTEXT_BIN" => Some(pdftotext.clone()),
            "SOFFICE_BIN" => Some("/nonexistent/soffice".to_string()),
            _ => None,
        })
        .expect("config")
    }

    #[test]
    fn missing_package_points_at_setup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = load_tokenizer(&config_with(dir.path(), "pdftotext")).unwrap_err();
        assert!(matches!(error, ConfigurationError::MissingDataPackage { .. }));
        assert!(error.to_string().contains("fda-process setup"));
    }

    #[test]
    fn install_then_load_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_with(&dir.path().join("tokenizer"), "pdftotext");
        install_tokenizer(&config.tokenizer_data_dir).expect("install");
        let data = load_tokenizer(&config).expect("load");
        assert_eq!(data.language(), "english");
    }

    #[tokio::test]
    async fn report_lists_missing_pieces() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = check_environment(&config_with(dir.path(), "/nonexistent/pdftotext")).await;
        assert!(!report.is_ready());
        assert!(!report.pdftotext.available);
        assert!(!report.tokenizer.installed);
        assert!(!report.credential_configured);
        let problems = report.problems();
        assert!(problems.iter().any(|problem| problem.contains("PDFTOTEXT_BIN")));
        assert!(problems.iter().any(|problem| problem.contains("fda-process setup")));
        assert!(matches!(
            report.ensure_ready(),
            Err(ConfigurationError::MissingTool { variable: "PDFTOTEXT_BIN", .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn available_tool_without_package_or_credential_is_not_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = check_environment(&config_with(dir.path(), "true")).await;
        assert!(report.pdftotext.available);
        assert!(matches!(
            report.ensure_ready(),
            Err(ConfigurationError::MissingDataPackage { .. })
        ));

        install_tokenizer(dir.path()).expect("install");
        let report = check_environment(&config_with(dir.path(), "true")).await;
        assert!(report.ensure_ready().is_ok());
        assert!(report.is_ready());
    }
}
