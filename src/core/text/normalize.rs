//! Text normalization ahead of phonemization
//!
//! Rewrites the surface forms eSpeak tends to mispronounce: typographic
//! quotes, full-width CJK punctuation, honorifics, digit groupings and ranges.
//! The output is still plain text; no phonemes are produced here.

use once_cell::sync::Lazy;
use regex::Regex;

// The regex crate has no look-around, so the patterns below capture the
// neighbouring character and put it back in the replacement.
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S \n]").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"  +").unwrap());

static HONORIFICS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bD[Rr]\. ([A-Z])", "Doctor $1"),
        (r"\bM[Rr]\. ([A-Z])", "Mister $1"),
        (r"\bM[Ss]\. ([A-Z])", "Miss $1"),
        (r"\bM[Rr][Ss]\. ([A-Z])", "Missus $1"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

static ETC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\betc\.").unwrap());
static YEAH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(y)eah?\b").unwrap());
static DIGIT_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d),(\d)").unwrap());
static RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)-(\d)").unwrap());
static PLURAL_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)S\b").unwrap());
static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z])\.([A-Z])").unwrap());

/// Full-width punctuation and the ASCII sequence it is spoken as
const CJK_PUNCTUATION: [(char, &str); 7] = [
    ('\u{3001}', ", "),
    ('\u{3002}', ". "),
    ('\u{ff01}', "! "),
    ('\u{ff0c}', ", "),
    ('\u{ff1a}', ": "),
    ('\u{ff1b}', "; "),
    ('\u{ff1f}', "? "),
];

/// Normalize raw input text for the phonemizer
///
/// Whitespace-only input normalizes to the empty string.
pub fn normalize_text(text: &str) -> String {
    let mut text: String = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            '(' => '\u{00ab}',
            ')' => '\u{00bb}',
            other => other,
        })
        .collect();

    for (from, to) in CJK_PUNCTUATION {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }

    text = WHITESPACE_RE.replace_all(&text, " ").into_owned();
    text = MULTI_SPACE_RE.replace_all(&text, " ").into_owned();

    for (pattern, replacement) in HONORIFICS.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text = ETC_RE.replace_all(&text, "etcetera").into_owned();
    text = YEAH_RE.replace_all(&text, "${1}e'a").into_owned();

    text = DIGIT_GROUP_RE.replace_all(&text, "$1$2").into_owned();
    text = RANGE_RE.replace_all(&text, "$1 to $2").into_owned();
    text = PLURAL_NUMBER_RE.replace_all(&text, "$1 S").into_owned();
    text = ACRONYM_RE.replace_all(&text, "$1-$2").into_owned();

    text.trim().to_string()
}
