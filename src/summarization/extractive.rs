//! Local extractive summaries ranked with TextRank.

use super::tokenizer::TokenizerData;
use crate::text::{evenly_spaced, split_sentences, truncate_words, word_tokens};
use std::collections::HashSet;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const CONVERGENCE: f64 = 1e-6;
/// Rough words per sentence used to size the sentence budget.
const WORDS_PER_SENTENCE: usize = 18;
const MIN_SENTENCES: usize = 3;
/// Largest sentence graph ranked; longer documents are sampled evenly across their length.
pub const MAX_CANDIDATES: usize = 400;

/// TextRank sentence ranker bound to a tokenizer data package.
#[derive(Debug, Clone)]
pub struct TextRankSummarizer {
    tokenizer: TokenizerData,
}

impl TextRankSummarizer {
    /// Build a summarizer over `tokenizer`.
    pub fn new(tokenizer: TokenizerData) -> Self {
        Self { tokenizer }
    }

    /// Number of sentences selected for a `max_words` budget.
    pub fn sentence_limit(max_words: usize) -> usize {
        (max_words / WORDS_PER_SENTENCE).max(MIN_SENTENCES)
    }

    /// Summarize `text` in at most `max_words` words. Empty input yields an empty summary.
    pub fn summarize(&self, text: &str, max_words: usize) -> String {
        let sentences = split_sentences(text, self.tokenizer.abbreviations());
        if sentences.is_empty() {
            return String::new();
        }

        let limit = Self::sentence_limit(max_words);
        let selected: Vec<usize> = if sentences.len() <= limit {
            (0..sentences.len()).collect()
        } else {
            let candidates = evenly_spaced(sentences.len(), MAX_CANDIDATES);
            let scores = self.rank(
                &candidates
                    .iter()
                    .map(|&index| sentences[index].as_str())
                    .collect::<Vec<_>>(),
            );
            let mut order: Vec<usize> = (0..candidates.len()).collect();
            order.sort_by(|&left, &right| {
                scores[right]
                    .total_cmp(&scores[left])
                    .then(left.cmp(&right))
            });
            let mut chosen: Vec<usize> = order
                .into_iter()
                .take(limit)
                .map(|position| candidates[position])
                .collect();
            chosen.sort_unstable();
            chosen
        };

        let summary = selected
            .into_iter()
            .map(|index| sentences[index].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        truncate_words(&summary, max_words)
    }

    fn content_words(&self, sentence: &str) -> HashSet<String> {
        word_tokens(sentence)
            .into_iter()
            .filter(|word| !self.tokenizer.is_stopword(word))
            .collect()
    }

    /// PageRank over the sentence similarity graph. Quadratic in `sentences.len()`.
    fn rank(&self, sentences: &[&str]) -> Vec<f64> {
        let words: Vec<HashSet<String>> = sentences
            .iter()
            .map(|sentence| self.content_words(sentence))
            .collect();
        let count = sentences.len();

        let mut weights = vec![vec![0.0_f64; count]; count];
        for i in 0..count {
            for j in (i + 1)..count {
                let similarity = similarity(&words[i], &words[j]);
                weights[i][j] = similarity;
                weights[j][i] = similarity;
            }
        }
        let out_weight: Vec<f64> = weights.iter().map(|row| row.iter().sum()).collect();

        let mut scores = vec![1.0 / count as f64; count];
        for _ in 0..MAX_ITERATIONS {
            let mut next = vec![(1.0 - DAMPING) / count as f64; count];
            for (i, slot) in next.iter_mut().enumerate() {
                let incoming: f64 = (0..count)
                    .filter(|&j| weights[j][i] > 0.0 && out_weight[j] > 0.0)
                    .map(|j| weights[j][i] / out_weight[j] * scores[j])
                    .sum();
                *slot += DAMPING * incoming;
            }
            let delta: f64 = next
                .iter()
                .zip(&scores)
                .map(|(new, old)| (new - old).abs())
                .sum();
            scores = next;
            if delta < CONVERGENCE {
                break;
            }
        }
        scores
    }
}

/// Shared-word similarity normalized by sentence lengths.
fn similarity(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    let common = left.intersection(right).count();
    if common == 0 {
        return 0.0;
    }
    let denominator = (left.len() as f64).ln() + (right.len() as f64).ln();
    if denominator <= 0.0 {
        1.0
    } else {
        common as f64 / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::count_words;

    fn summarizer() -> TextRankSummarizer {
        TextRankSummarizer::new(TokenizerData::bundled().expect("bundled package"))
    }

    #[test]
    fn sentence_limit_has_floor_of_three() {
        assert_eq!(TextRankSummarizer::sentence_limit(10), 3);
        assert_eq!(TextRankSummarizer::sentence_limit(250), 13);
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        assert_eq!(summarizer().summarize("", 250), "");
        assert_eq!(summarizer().summarize(" \n\t ", 250), "");
    }

    #[test]
    fn short_text_is_kept_whole() {
        let text = "The catheter is sterile. It is single use.";
        assert_eq!(summarizer().summarize(text, 250), text);
    }

    #[test]
    fn selects_central_sentences_in_document_order() {
        let text = "The catheter provides vascular access. \
            Weather was pleasant that day. \
            The catheter vascular access performance was tested. \
            Bench testing of the catheter showed vascular access performance. \
            Lunch was served at noon. \
            Testing demonstrated catheter performance. \
            Parking is available nearby.";
        let summary = summarizer().summarize(text, 54);
        assert!(summary.starts_with("The catheter provides vascular access."));
        assert!(!summary.contains("Lunch"));
        assert!(!summary.contains("Parking"));
        let first = summary.find("provides").expect("first sentence");
        let later = summary.find("Bench").expect("bench sentence");
        assert!(first < later);
    }

    #[test]
    fn sampling_is_ascending_and_bounded() {
        assert_eq!(evenly_spaced(3, 10), vec![0, 1, 2]);
        let sampled = evenly_spaced(10_000, MAX_CANDIDATES);
        assert_eq!(sampled.len(), MAX_CANDIDATES);
        assert_eq!(sampled[0], 0);
        assert!(sampled.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(*sampled.last().expect("last") < 10_000);
    }

    #[test]
    fn large_documents_finish_quickly() {
        let text: String = (0..20_000)
            .map(|index| {
                format!(
                    "Lot {index} of catheter batch {} met tensile criterion {} at site {}. ",
                    index % 97,
                    index % 13,
                    index % 7
                )
            })
            .collect();
        let started = std::time::Instant::now();
        let summary = summarizer().summarize(&text, 250);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(10),
            "took {:?}",
            started.elapsed()
        );
        assert!(!summary.is_empty());
        assert!(count_words(&summary) <= 250);
    }

    #[test]
    fn output_never_exceeds_word_cap() {
        let sentence = "The device met all predefined acceptance criteria for tensile strength testing. ";
        let text = sentence.repeat(400);
        for max_words in [1, 5, 40, 250] {
            let summary = summarizer().summarize(&text, max_words);
            assert!(count_words(&summary) <= max_words);
        }
    }
}
