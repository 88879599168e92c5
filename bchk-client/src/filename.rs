//! Output filename derivation for saved beats
//!
//! [`derive_filename`] is pure, total and deterministic. Feeding its own output
//! back in (with the same track facts) yields the same name.

use bchk_common::api::AnalysisResult;
use once_cell::sync::Lazy;
use regex::Regex;

/// Used when the title is empty or sanitizes to nothing
pub const PLACEHOLDER_TITLE: &str = "BeatChecker Track";

const EXTENSION: &str = ".mp3";
const TYPE_BEAT: &str = "type beat";

/// Leading promotional tag such as `[FREE]` or `(Free for profit)`
static PROMO_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*[\[(]\s*(?:free for profit|free|sold)\s*[\])]\s*")
        .expect("promo tag pattern is valid")
});

/// Characters not allowed in file names on common platforms
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// The parts of an analysis result that end up in a file name
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackFacts<'a> {
    pub bpm: Option<f64>,
    pub key: Option<&'a str>,
}

impl<'a> TrackFacts<'a> {
    pub fn from_result(result: &'a AnalysisResult) -> Self {
        Self {
            bpm: result.bpm_value(),
            key: result.key_value(),
        }
    }

    /// Rounded bpm, if finite and positive
    fn bpm_label(&self) -> Option<String> {
        self.bpm
            .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
            .map(|bpm| format!("{}", bpm.round() as i64))
    }

    /// Sanitized, lower-cased key, if non-blank
    fn key_label(&self) -> Option<String> {
        self.key
            .map(|key| sanitize(key).to_lowercase())
            .filter(|key| !key.is_empty())
    }
}

/// Derive the file name for a saved beat from its displayed title
///
/// # Examples
///
/// ```
/// use bchk_client::filename::{derive_filename, TrackFacts};
///
/// let facts = TrackFacts { bpm: Some(140.0), key: Some("C# Minor") };
/// assert_eq!(
///     derive_filename("Cold Nights type beat", &facts),
///     "cold nights type beat c# minor 140bpm.mp3"
/// );
/// ```
pub fn derive_filename(raw_title: &str, facts: &TrackFacts<'_>) -> String {
    let bpm = facts.bpm_label();
    let key = facts.key_label();

    // Sanitize first so an illegal character cannot hide a leading tag
    let cleaned = sanitize(raw_title);
    let cleaned = if cleaned.is_empty() {
        PLACEHOLDER_TITLE
    } else {
        cleaned.as_str()
    };

    let untailed = strip_derived_tail(cleaned, key.as_deref(), bpm.as_deref());

    let stripped = strip_promo_tags(untailed);
    let stripped = if stripped.trim().is_empty() {
        untailed
    } else {
        stripped
    };

    let mut title = sanitize(stripped);
    if title.is_empty() {
        title = PLACEHOLDER_TITLE.to_string();
    }

    match (key, bpm) {
        (Some(key), Some(bpm)) if title.to_lowercase().contains(TYPE_BEAT) => {
            let lower = title.to_lowercase();
            let prefix = lower
                .find(TYPE_BEAT)
                .map(|idx| lower[..idx].trim())
                .unwrap_or_default();
            let base = if prefix.is_empty() { lower.as_str() } else { prefix };
            let name = format!("{} {} {} {}bpm{}", base, TYPE_BEAT, key, bpm, EXTENSION);
            sanitize(&name.to_lowercase())
        }
        (Some(key), Some(bpm)) => sanitize(&format!("{} {} {}bpm{}", title, key, bpm, EXTENSION)),
        (_, Some(bpm)) => sanitize(&format!("{} {}bpm{}", title, bpm, EXTENSION)),
        _ => format!("{}{}", title, EXTENSION),
    }
}

/// [`derive_filename`] with the facts of an analysis result
pub fn filename_for_result(raw_title: &str, result: &AnalysisResult) -> String {
    derive_filename(raw_title, &TrackFacts::from_result(result))
}

/// Strip stacked leading promo tags
fn strip_promo_tags(title: &str) -> &str {
    let mut rest = title;
    while let Some(found) = PROMO_TAG.find(rest) {
        if found.end() == 0 {
            break;
        }
        rest = &rest[found.end()..];
    }
    rest
}

/// Replace illegal characters with spaces, collapse whitespace, trim
fn sanitize(text: &str) -> String {
    text.split(|c: char| ILLEGAL_CHARS.contains(&c) || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop a tail this module appended earlier: `.mp3`, then `{bpm}bpm`, then the key
///
/// Returns the input unchanged if stripping would leave nothing.
fn strip_derived_tail<'a>(title: &'a str, key: Option<&str>, bpm: Option<&str>) -> &'a str {
    let mut rest = title;

    if let Some(before) = strip_suffix_ci(rest, EXTENSION) {
        rest = before.trim_end();
    }

    let mut stripped_facts = false;
    if let Some(bpm) = bpm {
        if let Some(before) = strip_word_suffix(rest, &format!("{}bpm", bpm)) {
            rest = before;
            if let Some(key) = key {
                if let Some(before) = strip_word_suffix(rest, key) {
                    rest = before;
                    stripped_facts = true;
                }
            }
        }
    }

    // Whole-title type-beat names repeat the phrase once
    if stripped_facts {
        let lower = rest.to_lowercase();
        if lower.starts_with(TYPE_BEAT) {
            if let Some(before) = strip_word_suffix(rest, TYPE_BEAT) {
                if before.to_lowercase().contains(TYPE_BEAT) {
                    rest = before;
                }
            }
        }
    }

    if rest.trim().is_empty() {
        title
    } else {
        rest
    }
}

/// Strip `suffix` if it is a whole trailing word (case-insensitive)
fn strip_word_suffix<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let before = strip_suffix_ci(text, suffix)?;
    if before.is_empty() || before.ends_with(char::is_whitespace) {
        Some(before.trim_end())
    } else {
        None
    }
}

/// Case-insensitive `strip_suffix` on char boundaries
fn strip_suffix_ci<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let len = suffix.chars().count();
    if len == 0 {
        return None;
    }
    let (start, _) = text.char_indices().rev().nth(len - 1)?;
    let tail = &text[start..];
    (tail.to_lowercase() == suffix.to_lowercase()).then(|| &text[..start])
}
