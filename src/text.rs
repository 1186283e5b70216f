//! Small text helpers shared by the validator and the summarizers.

use std::collections::HashSet;

/// Count whitespace-delimited words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cap `text` at `max_words` words, marking the cut with an ellipsis on the last word.
///
/// The ellipsis is glued to the final word so the word count never exceeds `max_words`.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.trim().to_string();
    }
    if max_words == 0 {
        return String::new();
    }
    let mut truncated = words[..max_words].join(" ");
    truncated.push('…');
    truncated
}

/// Lowercase, replace non-alphanumerics with spaces and collapse runs of whitespace.
pub fn normalize_for_match(text: &str) -> String {
    let mut mapped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            mapped.extend(c.to_lowercase());
        } else {
            mapped.push(' ');
        }
    }
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased alphanumeric word tokens.
pub fn word_tokens(text: &str) -> Vec<String> {
    normalize_for_match(text)
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// `count` ascending indices spread evenly over `0..len`, or all of them when `len <= count`.
pub(crate) fn evenly_spaced(len: usize, count: usize) -> Vec<usize> {
    if len <= count {
        return (0..len).collect();
    }
    (0..count).map(|step| step * len / count).collect()
}

/// Split text into sentences on `.`, `!` and `?` followed by whitespace.
///
/// A period that closes a known abbreviation (`abbreviations` holds lowercase forms without the
/// trailing period, e.g. `"e.g"`, `"no"`), a single capital initial, or a decimal number does not
/// end a sentence.
pub fn split_sentences(text: &str, abbreviations: &HashSet<String>) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = chars.peek().map(|next| next.is_whitespace()).unwrap_or(true);
        if !followed_by_space {
            continue;
        }
        if c == '.' && ends_with_abbreviation(&current, abbreviations) {
            continue;
        }
        push_sentence(&mut sentences, &mut current);
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

fn ends_with_abbreviation(sentence: &str, abbreviations: &HashSet<String>) -> bool {
    let without_period = sentence.trim_end_matches('.');
    let last_word = without_period
        .rsplit(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    if last_word.is_empty() {
        return false;
    }
    // A lone capital is a name initial, except the Roman numerals in "Class I." or "Phase V."
    let mut letters = last_word.chars();
    if let (Some(first), None) = (letters.next(), letters.next()) {
        if first.is_uppercase() && !matches!(first, 'I' | 'V' | 'X') {
            return true;
        }
    }
    abbreviations.contains(&last_word.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_words_keeps_short_text() {
        assert_eq!(truncate_words("  one two  ", 5), "one two");
    }

    #[test]
    fn truncate_words_caps_long_text() {
        let truncated = truncate_words("one two three four", 2);
        assert_eq!(truncated, "one two…");
        assert_eq!(count_words(&truncated), 2);
    }

    #[test]
    fn normalize_for_match_strips_punctuation() {
        assert_eq!(
            normalize_for_match("Indications  for Use:"),
            "indications for use"
        );
        assert_eq!(normalize_for_match("510(k) Number"), "510 k number");
    }

    #[test]
    fn normalize_for_match_lowercases_non_ascii_letters() {
        assert_eq!(normalize_for_match("ÉTUDE Clinique"), "étude clinique");
        assert_eq!(word_tokens("STÉRILISATION"), vec!["stérilisation"]);
    }

    #[test]
    fn split_sentences_respects_abbreviations() {
        let abbreviations: HashSet<String> = ["e.g", "no", "dr"].iter().map(|s| s.to_string()).collect();
        let text = "See e.g. the device. It has no. 5 label! Dr. J. Smith wrote it? Done";
        let sentences = split_sentences(text, &abbreviations);
        assert_eq!(
            sentences,
            vec![
                "See e.g. the device.",
                "It has no. 5 label!",
                "Dr. J. Smith wrote it?",
                "Done"
            ]
        );
    }

    #[test]
    fn split_sentences_ignores_decimal_points() {
        let sentences = split_sentences("Accuracy was 98.5 percent. Done.", &HashSet::new());
        assert_eq!(sentences, vec!["Accuracy was 98.5 percent.", "Done."]);
    }

    #[test]
    fn roman_numeral_classes_end_sentences() {
        let text = "The device is Class I. The predicate is Class II. Phase V. Results follow.";
        let sentences = split_sentences(text, &HashSet::new());
        assert_eq!(
            sentences,
            vec![
                "The device is Class I.",
                "The predicate is Class II.",
                "Phase V.",
                "Results follow."
            ]
        );
        let named = split_sentences("Reviewed by J. Smith. Approved.", &HashSet::new());
        assert_eq!(named, vec!["Reviewed by J. Smith.", "Approved."]);
    }
}
