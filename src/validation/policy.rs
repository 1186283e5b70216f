//! QA checklist policy: which checks run and which phrases satisfy them.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Pathway;

const BUNDLED_POLICY: &str = include_str!("../../resources/checklist.json");
const DEFAULT_FUZZY_THRESHOLD: f32 = 0.85;
const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.58;

/// Errors raised while loading a checklist policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("failed to read checklist policy {path}: {source}")]
    Read {
        /// Policy path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The policy file is not valid policy JSON.
    #[error("invalid checklist policy {origin}: {source}")]
    Parse {
        /// Path or `bundled`.
        origin: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// The policy parsed but cannot be evaluated.
    #[error("invalid checklist policy {origin}: {reason}")]
    Invalid {
        /// Path or `bundled`.
        origin: String,
        /// What is wrong.
        reason: String,
    },
}

/// One questionnaire item.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionCheck {
    /// Stable check identifier used as the result key.
    pub id: String,
    /// Human-readable question.
    pub question: String,
    /// Phrases that satisfy the question when found in the text.
    pub key_phrases: Vec<String>,
}

/// Required template fields per regulatory pathway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFields {
    /// Fields expected in 510(k) summaries.
    #[serde(rename = "510k", default)]
    pub premarket_notification: Vec<String>,
    /// Fields expected in De Novo decision summaries.
    #[serde(default)]
    pub de_novo: Vec<String>,
    /// Fields expected in PMA summaries.
    #[serde(default)]
    pub pma: Vec<String>,
}

impl TemplateFields {
    /// Fields for `pathway`.
    pub fn for_pathway(&self, pathway: Pathway) -> &[String] {
        match pathway {
            Pathway::PremarketNotification => &self.premarket_notification,
            Pathway::DeNovo => &self.de_novo,
            Pathway::Pma => &self.pma,
        }
    }
}

/// Complete checklist policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistPolicy {
    /// Minimum share of a phrase's words that must appear in a sentence fragment.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,
    /// Minimum cosine similarity between a phrase and a fragment embedding. `null` turns the
    /// embedding tier off.
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: Option<f32>,
    /// Questionnaire checks.
    pub questions: Vec<QuestionCheck>,
    /// Template fields per pathway.
    #[serde(default)]
    pub templates: TemplateFields,
}

fn default_fuzzy_threshold() -> f32 {
    DEFAULT_FUZZY_THRESHOLD
}

fn default_semantic_threshold() -> Option<f32> {
    Some(DEFAULT_SEMANTIC_THRESHOLD)
}

impl ChecklistPolicy {
    /// Policy compiled into the binary.
    pub fn bundled() -> Result<Self, PolicyError> {
        Self::from_json(BUNDLED_POLICY, "bundled")
    }

    /// Load a policy file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, &path.display().to_string())
    }

    /// Load from `path` when given, otherwise use the bundled policy.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self, PolicyError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        }
    }

    /// Parse and validate policy JSON.
    pub fn from_json(raw: &str, origin: &str) -> Result<Self, PolicyError> {
        let policy: Self = serde_json::from_str(raw).map_err(|source| PolicyError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        policy.validate(origin)?;
        Ok(policy)
    }

    fn validate(&self, origin: &str) -> Result<(), PolicyError> {
        let invalid = |reason: String| PolicyError::Invalid {
            origin: origin.to_string(),
            reason,
        };
        if !(self.fuzzy_threshold > 0.0 && self.fuzzy_threshold <= 1.0) {
            return Err(invalid(format!(
                "fuzzy_threshold must be in (0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        if let Some(threshold) = self.semantic_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(invalid(format!(
                    "semantic_threshold must be in (0, 1], got {threshold}"
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(invalid(format!("duplicate check id '{}'", question.id)));
            }
            if question
                .key_phrases
                .iter()
                .all(|phrase| phrase.trim().is_empty())
            {
                return Err(invalid(format!(
                    "check '{}' has no key phrases",
                    question.id
                )));
            }
        }
        Ok(())
    }
}
