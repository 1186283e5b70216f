//! QA and template conformance checks over extracted text.
//!
//! Checks come from a [`ChecklistPolicy`]: questionnaire items that must be answered somewhere in
//! the summary, plus the template fields required for the detected regulatory pathway. Failed
//! checks are reported in the [`ValidationResult`]; only an unevaluable input is an error.

mod matcher;
pub mod policy;

pub use policy::{ChecklistPolicy, PolicyError, QuestionCheck, TemplateFields};

use crate::embedding::{Embedder, EmbeddingError};
use crate::processing::types::Page;
use crate::text::evenly_spaced;
use matcher::Fragment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Prefix applied to template field check names.
pub const TEMPLATE_CHECK_PREFIX: &str = "template:";
/// Most fragments embedded for the similarity tier; longer documents are sampled evenly.
const MAX_SEMANTIC_FRAGMENTS: usize = 2_000;

/// Errors raised when the check set cannot be evaluated.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// There is no text to check.
    #[error("no text to validate")]
    EmptyText,
    /// The blocking validation task panicked or was cancelled.
    #[error("validation task failed: {0}")]
    Interrupted(String),
}

/// Regulatory pathway inferred from the summary text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Pathway {
    /// 510(k) premarket notification.
    #[serde(rename = "510k")]
    PremarketNotification,
    /// De Novo classification request.
    #[serde(rename = "de_novo")]
    DeNovo,
    /// Premarket approval.
    #[serde(rename = "pma")]
    Pma,
}

impl Pathway {
    /// Infer the pathway: `510(k)` wins over `de novo`; anything else is treated as PMA.
    pub fn detect(text: &str) -> Self {
        let lowered = text.to_lowercase();
        if lowered.contains("510(k)") {
            Self::PremarketNotification
        } else if lowered.contains("de novo") {
            Self::DeNovo
        } else {
            Self::Pma
        }
    }
}

/// Origin of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Questionnaire item.
    Question,
    /// Pathway template field.
    TemplateField,
}

/// Outcome of a single named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Origin of the check.
    pub kind: CheckKind,
    /// Question text or field name.
    pub description: String,
    /// Whether the check found supporting text.
    pub passed: bool,
    /// Pages where supporting text was found, ascending.
    pub pages: Vec<u32>,
    /// Phrase that produced the match, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_phrase: Option<String>,
    /// Whether the match came from embedding similarity rather than the text itself.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub semantic: bool,
}

/// Per-check findings for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Detected regulatory pathway.
    pub pathway: Pathway,
    /// Findings keyed by check name.
    pub checks: BTreeMap<String, CheckOutcome>,
}

impl ValidationResult {
    /// Whether every check passed.
    pub fn all_passed(&self) -> bool {
        self.checks.values().all(|outcome| outcome.passed)
    }

    /// Names of the checks that failed, in key order.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, outcome)| !outcome.passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Number of passing checks.
    pub fn passed_count(&self) -> usize {
        self.checks.values().filter(|outcome| outcome.passed).count()
    }
}

/// Evaluates a checklist policy against extracted pages.
///
/// Matching runs in tiers: normalized substring, then word coverage, then (when an embedder is
/// attached and the policy sets `semantic_threshold`) cosine similarity between phrase and
/// fragment embeddings. The similarity tier only runs for checks the text tiers left failing.
#[derive(Clone)]
pub struct Validator {
    policy: Arc<ChecklistPolicy>,
    semantic: Option<Embedder>,
}

impl Validator {
    /// Build a validator for `policy` using the text tiers only.
    pub fn new(policy: ChecklistPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            semantic: None,
        }
    }

    /// Attach an embedder for the similarity tier.
    pub fn with_semantic(mut self, embedder: Embedder) -> Self {
        self.semantic = Some(embedder);
        self
    }

    /// Active policy.
    pub fn policy(&self) -> &ChecklistPolicy {
        &self.policy
    }

    /// Evaluate every check. Deterministic for identical input and backend.
    ///
    /// A failing similarity backend is logged and leaves the text-tier findings in place.
    pub async fn check(&self, pages: &[Page]) -> Result<ValidationResult, ValidationError> {
        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(ValidationError::EmptyText);
        }

        let policy = Arc::clone(&self.policy);
        let owned = pages.to_vec();
        let (mut result, fragments) =
            tokio::task::spawn_blocking(move || check_text(&policy, &owned))
                .await
                .map_err(|error| ValidationError::Interrupted(error.to_string()))?;

        if let (Some(embedder), Some(threshold)) = (&self.semantic, self.policy.semantic_threshold)
        {
            if !result.all_passed() {
                match self
                    .check_semantic(embedder, threshold, &fragments, &mut result)
                    .await
                {
                    Ok(upgraded) => {
                        tracing::debug!(upgraded, "Similarity tier evaluated");
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Similarity tier skipped");
                    }
                }
            }
        }

        tracing::debug!(
            pathway = ?result.pathway,
            passed = result.passed_count(),
            total = result.checks.len(),
            "Validation complete"
        );
        Ok(result)
    }

    /// Re-evaluate failing checks by embedding similarity. Returns how many checks now pass.
    async fn check_semantic(
        &self,
        embedder: &Embedder,
        threshold: f32,
        fragments: &[Fragment],
        result: &mut ValidationResult,
    ) -> Result<usize, EmbeddingError> {
        let mut pending: Vec<(String, Vec<String>)> = Vec::new();
        for question in &self.policy.questions {
            if result.checks.get(&question.id).is_some_and(|outcome| !outcome.passed) {
                pending.push((question.id.clone(), question.key_phrases.clone()));
            }
        }
        for field in self.policy.templates.for_pathway(result.pathway) {
            let name = format!("{TEMPLATE_CHECK_PREFIX}{field}");
            if result.checks.get(&name).is_some_and(|outcome| !outcome.passed) {
                pending.push((name, vec![field.clone()]));
            }
        }
        if pending.is_empty() || fragments.is_empty() {
            return Ok(0);
        }

        let sample = evenly_spaced(fragments.len(), MAX_SEMANTIC_FRAGMENTS);
        let texts: Vec<String> = sample
            .iter()
            .map(|&index| fragments[index].text().to_string())
            .collect();
        let fragment_vectors = embedder.embed_each(&texts).await?;
        let phrases: Vec<String> = pending
            .iter()
            .flat_map(|(_, phrases)| phrases.iter().cloned())
            .collect();
        let phrase_vectors = embedder.embed_each(&phrases).await?;

        let mut upgraded = 0;
        let mut offset = 0;
        for (name, check_phrases) in pending {
            let queries = &phrase_vectors[offset..offset + check_phrases.len()];
            offset += check_phrases.len();
            for (phrase, query) in check_phrases.iter().zip(queries) {
                let hits = matcher::semantic_pages(
                    query,
                    &fragment_vectors,
                    &sample,
                    fragments,
                    threshold,
                );
                if hits.is_empty() {
                    continue;
                }
                if let Some(outcome) = result.checks.get_mut(&name) {
                    outcome.passed = true;
                    outcome.pages = hits.into_iter().collect();
                    outcome.matched_phrase = Some(phrase.clone());
                    outcome.semantic = true;
                    upgraded += 1;
                }
                break;
            }
        }
        Ok(upgraded)
    }
}

/// Text tiers over every check, plus the fragments they were matched against.
fn check_text(policy: &ChecklistPolicy, pages: &[Page]) -> (ValidationResult, Vec<Fragment>) {
    let full_text = pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let pathway = Pathway::detect(&full_text);
    let fragments = matcher::sentence_fragments(pages);
    let threshold = policy.fuzzy_threshold;
    let mut checks = BTreeMap::new();

    for question in &policy.questions {
        let mut outcome = CheckOutcome {
            kind: CheckKind::Question,
            description: question.question.clone(),
            passed: false,
            pages: Vec::new(),
            matched_phrase: None,
            semantic: false,
        };
        for phrase in &question.key_phrases {
            let hits = matcher::phrase_pages(phrase, &fragments, threshold);
            if !hits.is_empty() {
                outcome.passed = true;
                outcome.pages = hits.into_iter().collect();
                outcome.matched_phrase = Some(phrase.clone());
                break;
            }
        }
        checks.insert(question.id.clone(), outcome);
    }

    for field in policy.templates.for_pathway(pathway) {
        let hits = matcher::phrase_pages(field, &fragments, threshold);
        let passed = !hits.is_empty();
        checks.insert(
            format!("{TEMPLATE_CHECK_PREFIX}{field}"),
            CheckOutcome {
                kind: CheckKind::TemplateField,
                description: field.clone(),
                passed,
                pages: hits.into_iter().collect(),
                matched_phrase: passed.then(|| field.clone()),
                semantic: false,
            },
        );
    }

    (ValidationResult { pathway, checks }, fragments)
}
