//! Phrase matching over sentence fragments: normalized substring first, then word coverage,
//! then embedding similarity when the caller supplies vectors.

use crate::processing::types::Page;
use crate::text::{normalize_for_match, split_sentences, word_tokens};
use std::collections::{BTreeSet, HashSet};

/// Sentence fragment with its page and pre-normalized forms.
pub(crate) struct Fragment {
    page: u32,
    text: String,
    normalized: String,
    tokens: HashSet<String>,
}

/// Split pages into sentence fragments, further split on `:` to isolate headings.
pub(crate) fn sentence_fragments(pages: &[Page]) -> Vec<Fragment> {
    let no_abbreviations = HashSet::new();
    let mut fragments = Vec::new();
    for page in pages {
        for sentence in split_sentences(&page.text, &no_abbreviations) {
            for part in sentence.split(':') {
                let normalized = normalize_for_match(part);
                if normalized.is_empty() {
                    continue;
                }
                let tokens = word_tokens(part).into_iter().collect();
                fragments.push(Fragment {
                    page: page.number,
                    text: part.trim().to_string(),
                    normalized,
                    tokens,
                });
            }
        }
    }
    fragments
}

/// Pages on which `phrase` matches at least one fragment.
pub(crate) fn phrase_pages(phrase: &str, fragments: &[Fragment], threshold: f32) -> BTreeSet<u32> {
    let normalized = normalize_for_match(phrase);
    if normalized.is_empty() {
        return BTreeSet::new();
    }
    let phrase_tokens = word_tokens(phrase);

    fragments
        .iter()
        .filter(|fragment| {
            contains_phrase(&fragment.normalized, &normalized)
                || coverage(&phrase_tokens, &fragment.tokens) >= threshold
        })
        .map(|fragment| fragment.page)
        .collect()
}

impl Fragment {
    /// Fragment text as it appeared on the page.
    pub(crate) fn text(&self) -> &str {
        &self.text
    }
}

/// Pages of the fragments whose vector has cosine similarity `>= threshold` with `query`.
///
/// `sample[i]` is the index into `fragments` that `vectors[i]` was computed from. Vectors are
/// expected to be unit length, so the dot product is the cosine.
pub(crate) fn semantic_pages(
    query: &[f32],
    vectors: &[Vec<f32>],
    sample: &[usize],
    fragments: &[Fragment],
    threshold: f32,
) -> BTreeSet<u32> {
    vectors
        .iter()
        .zip(sample)
        .filter(|(vector, _)| dot(query, vector) >= threshold)
        .map(|(_, &index)| fragments[index].page)
        .collect()
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}

/// Word-boundary substring test on normalized text.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let padded_haystack = format!(" {haystack} ");
    let padded_needle = format!(" {needle} ");
    padded_haystack.contains(&padded_needle)
}

fn coverage(phrase_tokens: &[String], fragment_tokens: &HashSet<String>) -> f32 {
    if phrase_tokens.is_empty() {
        return 0.0;
    }
    let hits = phrase_tokens
        .iter()
        .filter(|token| fragment_tokens.contains(*token))
        .count();
    hits as f32 / phrase_tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<Page> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| Page {
                number: index as u32 + 1,
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn headings_split_on_colon() {
        let fragments = sentence_fragments(&pages(&["Indications for Use: The device is used."]));
        let normalized: Vec<&str> = fragments.iter().map(|f| f.normalized.as_str()).collect();
        assert_eq!(normalized, vec!["indications for use", "the device is used"]);
    }

    #[test]
    fn substring_match_records_pages() {
        let fragments = sentence_fragments(&pages(&[
            "Nothing here.",
            "The Device Description follows.",
            "Another device description.",
        ]));
        let hits = phrase_pages("device description", &fragments, 0.85);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn reordered_words_match_by_coverage() {
        let fragments = sentence_fragments(&pages(&["Testing of performance was completed."]));
        assert_eq!(phrase_pages("performance testing", &fragments, 0.85).len(), 1);
        assert!(phrase_pages("performance data", &fragments, 0.85).is_empty());
    }

    #[test]
    fn partial_words_do_not_match() {
        let fragments = sentence_fragments(&pages(&["The sterilizations were validated."]));
        assert!(phrase_pages("sterilization", &fragments, 0.85).is_empty());
    }

    #[test]
    fn semantic_pages_use_the_sampled_fragment_index() {
        let fragments = sentence_fragments(&pages(&["Alpha.", "Beta.", "Gamma."]));
        assert_eq!(fragments[2].text(), "Gamma.");
        let sample = vec![0, 2];
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let hits = semantic_pages(&[1.0, 0.0], &vectors, &sample, &fragments, 0.58);
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![3]);
        assert!(semantic_pages(&[0.0, 0.0], &vectors, &sample, &fragments, 0.58).is_empty());
    }
}
