//! Phrase normalization for variant comparison.
//!
//! Applies, in order:
//! - lowercase (`IGNORES_CASE`)
//! - canonical decomposition, combining-mark removal, recomposition (`IGNORES_DIACRITICS`)
//! - removal of every Unicode punctuation code point (`IGNORES_PUNCTUATION`)
//! - whitespace collapsing and trimming (always)
//!
//! Normalization is idempotent for every mode.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::models::InterlinearMode;

/// Canonicalize a phrase for comparison under `mode`.
pub fn normalize(text: &str, mode: InterlinearMode) -> String {
    let mut normalized = if mode.contains(InterlinearMode::IGNORES_CASE) {
        text.to_lowercase()
    } else {
        text.to_string()
    };

    if mode.contains(InterlinearMode::IGNORES_DIACRITICS) {
        normalized = strip_diacritics(&normalized);
    }

    if mode.contains(InterlinearMode::IGNORES_PUNCTUATION) {
        normalized = normalized.chars().filter(|&c| !is_punctuation(c)).collect();
    }

    collapse_whitespace(&normalized)
}

/// Remove combining marks after canonical decomposition, then recompose.
pub fn strip_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|&c| !is_combining_mark(c))
        .nfc()
        .collect()
}

/// Any code point in the Unicode punctuation categories (Pc, Pd, Ps, Pe, Pi, Pf, Po).
pub fn is_punctuation(c: char) -> bool {
    c.general_category_group() == GeneralCategoryGroup::Punctuation
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
