//! ASCII comparison keys for player names.
//!
//! Names arrive from the roster with whatever accents the listing used, while
//! profile headings and override keys may spell them differently. Everything
//! is folded down to lowercase `a-z` before it is compared.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Letters that NFD does not split into base + combining mark.
const SPECIAL_CHARS: &[(char, &str)] = &[
    ('ı', "i"),
    ('İ', "i"),
    ('Ł', "l"),
    ('ł', "l"),
    ('Ø', "o"),
    ('ø', "o"),
    ('Đ', "d"),
    ('đ', "d"),
    ('ß', "ss"),
    ('Æ', "ae"),
    ('æ', "ae"),
    ('Œ', "oe"),
    ('œ', "oe"),
    ('Þ', "th"),
    ('þ', "th"),
];

static NON_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z]").expect("static pattern"));

/// Normalize a single token. Returns an empty string when nothing
/// letter-like survives (e.g. `"III"` survives, `"3"` does not).
pub fn normalize_token(token: &str) -> String {
    let mut substituted = String::with_capacity(token.len());
    for ch in token.chars() {
        match SPECIAL_CHARS.iter().find(|(c, _)| *c == ch) {
            Some((_, replacement)) => substituted.push_str(replacement),
            None => substituted.push(ch),
        }
    }

    let ascii: String = substituted.nfd().filter(char::is_ascii).collect();
    NON_LETTER.replace_all(&ascii, "").to_ascii_lowercase()
}

/// Normalize a whole name token by token. Tokens that normalize to nothing
/// are dropped so the result never carries doubled spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized name with the spaces removed, for whitespace-insensitive
/// containment checks.
pub fn compact(normalized: &str) -> String {
    normalized.chars().filter(|c| !c.is_whitespace()).collect()
}
