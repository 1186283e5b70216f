//! Sentence tokenizer data package: abbreviations and stopwords for the extractive summarizer.
//!
//! The package is installed once into `TOKENIZER_DATA_DIR` by `fda-process setup` and loaded at
//! start-up. A missing package is reported, never silently replaced.

use serde::Deserialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the package inside the data directory.
pub const PACKAGE_FILE: &str = "english.json";

const BUNDLED_PACKAGE: &str = include_str!("../../resources/tokenizer/english.json");

/// Errors raised while loading the tokenizer data package.
#[derive(Debug, Error)]
pub enum TokenizerDataError {
    /// The package file does not exist.
    #[error("tokenizer data package not found at {}", path.display())]
    Missing {
        /// Expected package path.
        path: PathBuf,
    },
    /// The package exists but cannot be used.
    #[error("tokenizer data package {} is invalid: {reason}", path.display())]
    Invalid {
        /// Package path.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },
    /// The package could not be read.
    #[error("failed to read tokenizer data package {}: {source}", path.display())]
    Io {
        /// Package path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

#[derive(Deserialize)]
struct PackageFile {
    language: String,
    version: u32,
    abbreviations: Vec<String>,
    stopwords: Vec<String>,
}

/// Loaded tokenizer data.
#[derive(Debug, Clone)]
pub struct TokenizerData {
    language: String,
    version: u32,
    abbreviations: HashSet<String>,
    stopwords: HashSet<String>,
}

impl TokenizerData {
    /// Load the package installed in `dir`.
    pub fn load(dir: &Path) -> Result<Self, TokenizerDataError> {
        let path = dir.join(PACKAGE_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(TokenizerDataError::Missing { path });
            }
            Err(source) => return Err(TokenizerDataError::Io { path, source }),
        };
        Self::parse(&raw, &path)
    }

    /// Package compiled into the binary, as installed by `setup`.
    pub fn bundled() -> Result<Self, TokenizerDataError> {
        Self::parse(BUNDLED_PACKAGE, Path::new("bundled"))
    }

    /// Write the bundled package into `dir`, creating it when needed. Returns the package path.
    pub fn install(dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(PACKAGE_FILE);
        std::fs::write(&path, BUNDLED_PACKAGE)?;
        Ok(path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, TokenizerDataError> {
        let invalid = |reason: String| TokenizerDataError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        let file: PackageFile =
            serde_json::from_str(raw).map_err(|error| invalid(error.to_string()))?;
        if file.stopwords.is_empty() {
            return Err(invalid("stopword list is empty".to_string()));
        }
        Ok(Self {
            language: file.language,
            version: file.version,
            abbreviations: lowercase_set(file.abbreviations),
            stopwords: lowercase_set(file.stopwords),
        })
    }

    /// Package language.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Package format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Abbreviations that do not end a sentence, lowercase without the trailing period.
    pub fn abbreviations(&self) -> &HashSet<String> {
        &self.abbreviations
    }

    /// Whether `word` (lowercase) carries no ranking signal.
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}

fn lowercase_set(words: Vec<String>) -> HashSet<String> {
    words
        .into_iter()
        .map(|word| word.trim().trim_end_matches('.').to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_package_is_reported_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = TokenizerData::load(dir.path()).unwrap_err();
        match error {
            TokenizerDataError::Missing { path } => assert!(path.ends_with(PACKAGE_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn installed_package_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = TokenizerData::install(&dir.path().join("nested")).expect("install");
        assert!(path.exists());
        let data = TokenizerData::load(&dir.path().join("nested")).expect("load");
        assert_eq!(data.language(), "english");
        assert!(data.is_stopword("the"));
        assert!(data.abbreviations().contains("e.g"));
    }

    #[test]
    fn corrupt_package_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PACKAGE_FILE), "{not json").expect("write");
        assert!(matches!(
            TokenizerData::load(dir.path()),
            Err(TokenizerDataError::Invalid { .. })
        ));
    }
}
