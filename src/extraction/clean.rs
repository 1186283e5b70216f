//! Page text normalization applied to converter output.

use regex::Regex;
use std::sync::LazyLock;

/// Running header stamped on decision summaries, e.g. `K240287 - Page 3 of 12`.
static RUNNING_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)K\d{6,7}.*Page \d+ of \d+").expect("valid header regex"));
static HYPHEN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[ \t]*\n\s*").expect("valid hyphen regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const LIGATURES: &[(char, &str)] = &[
    ('\u{fb00}', "ff"),
    ('\u{fb01}', "fi"),
    ('\u{fb02}', "fl"),
    ('\u{fb03}', "ffi"),
    ('\u{fb04}', "ffl"),
    ('\u{fb05}', "st"),
    ('\u{fb06}', "st"),
];

/// Clean one page of raw converter output.
///
/// Drops running header lines, expands ligatures, removes soft hyphens, joins words split across
/// line breaks and collapses all whitespace to single spaces.
pub(crate) fn clean_page(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| !RUNNING_HEADER.is_match(line))
        .filter(|line| !line.trim().is_empty())
        .collect();
    let joined = kept.join("\n");

    let mut expanded = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '\u{00ad}' => {}
            '\u{00a0}' | '\u{2007}' | '\u{202f}' => expanded.push(' '),
            _ => match LIGATURES.iter().find(|(ligature, _)| *ligature == c) {
                Some((_, replacement)) => expanded.push_str(replacement),
                None => expanded.push(c),
            },
        }
    }

    let dehyphenated = HYPHEN_BREAK.replace_all(&expanded, "");
    WHITESPACE
        .replace_all(&dehyphenated, " ")
        .trim()
        .to_string()
}
