//! Comparers: verse label ordering, phrase equality and apparatus row ordering.

use std::cmp::Ordering;

use crate::canon::Canon;
use crate::models::{ApparatusRow, InterlinearMode};
use crate::normalize::normalize;

/// Shape of a verse label after its leading number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerseSuffix<'a> {
    /// "12"
    Bare,
    /// "12b"
    Letter(&'a str),
    /// "12-13"
    Range,
}

#[derive(Debug, Clone, Copy)]
struct VerseLabel<'a> {
    number: u32,
    suffix: VerseSuffix<'a>,
}

fn parse_label(label: &str) -> Option<VerseLabel<'_>> {
    let label = label.trim();
    let digits = label.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let number = label[..digits].parse::<u32>().ok()?;
    let rest = &label[digits..];

    let suffix = if rest.is_empty() {
        VerseSuffix::Bare
    } else if rest.chars().all(|c| c.is_ascii_alphabetic()) {
        VerseSuffix::Letter(rest)
    } else if let Some(end) = rest.strip_prefix('-') {
        let end = end.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        if end.is_empty() || !end.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        VerseSuffix::Range
    } else {
        return None;
    };

    Some(VerseLabel { number, suffix })
}

/// Leading numeric value of a verse label, if it parses.
pub fn verse_number(label: &str) -> Option<u32> {
    parse_label(label).map(|parsed| parsed.number)
}

/// Total order over verse labels: integers ("12"), letter-suffixed ("12b") and
/// hyphen ranges ("12-13").
///
/// Labels compare by leading number. At equal numbers a bare verse sorts before
/// its lettered parts, and lettered parts compare by letter. When either side is
/// a range the raw strings are compared. Unparseable labels sort after all
/// parseable ones.
pub fn compare_verses(a: &str, b: &str) -> Ordering {
    match (parse_label(a), parse_label(b)) {
        (None, None) => a.cmp(b),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.number.cmp(&y.number).then_with(|| {
            match (x.suffix, y.suffix) {
                (VerseSuffix::Range, _) | (_, VerseSuffix::Range) => a.cmp(b),
                (VerseSuffix::Bare, VerseSuffix::Bare) => Ordering::Equal,
                (VerseSuffix::Bare, VerseSuffix::Letter(_)) => Ordering::Less,
                (VerseSuffix::Letter(_), VerseSuffix::Bare) => Ordering::Greater,
                (VerseSuffix::Letter(p), VerseSuffix::Letter(q)) => p.cmp(q),
            }
        }),
    }
}

/// Whether two phrases are the same reading under `mode`.
pub fn phrases_equal(a: &str, b: &str, mode: InterlinearMode) -> bool {
    normalize(a, mode) == normalize(b, mode)
}

/// Order rows by canon book order, chapter, then verse.
///
/// Books missing from the canon sort after known books, by name.
pub fn compare_rows(canon: &Canon, a: &ApparatusRow, b: &ApparatusRow) -> Ordering {
    let book_key = |book: &str| match canon.get_book_num(book) {
        0 => u32::MAX,
        n => n,
    };

    book_key(&a.book)
        .cmp(&book_key(&b.book))
        .then_with(|| {
            if book_key(&a.book) == u32::MAX {
                a.book.cmp(&b.book)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| a.chapter_number.cmp(&b.chapter_number))
        .then_with(|| compare_verses(&a.verse, &b.verse))
}

/// Stable sort into apparatus order; phrases within a verse keep their order.
pub fn sort_rows(canon: &Canon, rows: &mut [ApparatusRow]) {
    rows.sort_by(|a, b| compare_rows(canon, a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(book: &str, chapter: u32, verse: &str, phrase: &str) -> ApparatusRow {
        ApparatusRow {
            book: book.to_string(),
            chapter_number: chapter,
            verse: verse.to_string(),
            phrase: phrase.to_string(),
            occurrence: 0,
            variants: vec![],
        }
    }

    #[test]
    fn test_numeric_before_lexicographic() {
        assert_eq!(compare_verses("9", "10"), Ordering::Less);
        assert_eq!(compare_verses("10", "9"), Ordering::Greater);
        assert_eq!(compare_verses("12", "12"), Ordering::Equal);
    }

    #[test]
    fn test_letter_suffixes() {
        assert_eq!(compare_verses("12", "12b"), Ordering::Less);
        assert_eq!(compare_verses("12a", "12b"), Ordering::Less);
        assert_eq!(compare_verses("12b", "12"), Ordering::Greater);
        assert_eq!(compare_verses("12", "13"), Ordering::Less);
        assert_eq!(compare_verses("12b", "13"), Ordering::Less);
    }

    #[test]
    fn test_ranges_compare_by_first_number() {
        assert_eq!(compare_verses("12-13", "14"), Ordering::Less);
        assert_eq!(compare_verses("11", "12-13"), Ordering::Less);
    }

    #[test]
    fn test_range_tie_falls_back_to_raw_strings() {
        // Equal leading numbers with a range on either side compare as plain strings.
        assert_eq!(compare_verses("12", "12-13"), Ordering::Less);
        assert_eq!(compare_verses("12-13", "12"), Ordering::Greater);
        assert_eq!(compare_verses("12b", "12-13"), Ordering::Greater);
        assert_eq!(compare_verses("12-14", "12-13"), Ordering::Greater);
    }

    #[test]
    fn test_unparseable_sorts_last() {
        assert_eq!(compare_verses("title", "150"), Ordering::Greater);
        assert_eq!(compare_verses("1", "x"), Ordering::Less);
        assert_eq!(compare_verses("a", "b"), Ordering::Less);
        assert_eq!(compare_verses("12-", "13"), Ordering::Greater);

        let mut labels = vec!["x", "10", "9", "12b", "12", "13"];
        labels.sort_by(|a, b| compare_verses(a, b));
        assert_eq!(labels, vec!["9", "10", "12", "12b", "13", "x"]);
    }

    #[test]
    fn test_phrases_equal() {
        assert!(phrases_equal("This", "this", InterlinearMode::IGNORES_CASE));
        assert!(!phrases_equal("This", "this", InterlinearMode::NONE));
        assert!(phrases_equal("word,", "word", InterlinearMode::IGNORES_PUNCTUATION));
        assert!(phrases_equal(" a  b ", "a b", InterlinearMode::NONE));
    }

    #[test]
    fn test_sort_rows_by_canon_order() {
        let canon = Canon::protestant();
        let mut rows = vec![
            row("Jude", 1, "3", "c"),
            row("Unknown", 1, "1", "z"),
            row("1 John", 1, "10", "b"),
            row("1 John", 1, "9", "a2"),
            row("Genesis", 2, "1", "g"),
            row("1 John", 1, "9", "a1"),
        ];
        sort_rows(canon, &mut rows);
        let phrases: Vec<&str> = rows.iter().map(|r| r.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["g", "a2", "a1", "b", "c", "z"]);
    }
}
