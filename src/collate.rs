//! Apparatus generation: align each comparison translation against the base
//! text verse by verse, and turn the differences into apparatus rows.
//!
//! Chapters are independent, so whole-book requests are collated in parallel.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, warn};

use crate::align::{align_words, tokenize, variant_spans, VariantSpan};
use crate::canon::Canon;
use crate::compare::sort_rows;
use crate::models::{AlignParams, ApparatusRow, ApparatusTable, Chapter, RenderParams};
use crate::normalize::normalize;
use crate::provider::{Provider, ProviderError};
use crate::reference::PassageReference;

/// What to collate: a base translation against comparison translations over a passage.
///
/// A passage at chapter 0 (a bare book name) covers every chapter of the book.
#[derive(Debug, Clone)]
pub struct ApparatusRequest {
    pub base: String,
    pub comparisons: Vec<String>,
    pub passage: PassageReference,
}

/// One comparison translation aligned against a base verse.
struct Witness<'a> {
    words: Vec<&'a str>,
    spans: Vec<VariantSpan>,
    matched: Vec<Option<usize>>,
}

impl Witness<'_> {
    /// Words this witness reads over a non-empty base range. Additions at the very
    /// start of the range belong to their own row and are skipped.
    fn reading_over<'b>(&'b self, range: Range<usize>, base: &[&'b str]) -> Vec<&'b str> {
        let mut words = Vec::new();
        let mut i = range.start;

        while i < range.end {
            let span = self
                .spans
                .iter()
                .find(|s| s.base.start == i && !(s.is_addition() && i == range.start));

            match span {
                Some(span) => {
                    words.extend_from_slice(&self.words[span.other.clone()]);
                    if span.is_addition() {
                        words.push(self.matched_word(i, base));
                        i += 1;
                    } else {
                        i = span.base.end;
                    }
                }
                None => {
                    words.push(self.matched_word(i, base));
                    i += 1;
                }
            }
        }

        words
    }

    /// Words this witness adds before base word `point`.
    fn addition_at(&self, point: usize) -> Vec<&str> {
        self.spans
            .iter()
            .find(|s| s.is_addition() && s.base.start == point)
            .map(|s| self.words[s.other.clone()].to_vec())
            .unwrap_or_default()
    }

    fn matched_word<'b>(&'b self, i: usize, base: &[&'b str]) -> &'b str {
        match self.matched.get(i).copied().flatten() {
            Some(j) => self.words[j],
            None => base[i],
        }
    }
}

/// Merge the variant spans of every witness into the base ranges that become rows.
///
/// Overlapping ranges merge. A pure addition merges only with additions at the
/// same point or with a range that strictly contains the point.
fn union_spans<'s, I>(spans: I) -> Vec<Range<usize>>
where
    I: IntoIterator<Item = &'s VariantSpan>,
{
    let mut ranges: Vec<Range<usize>> = spans.into_iter().map(|s| s.base.clone()).collect();
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<Range<usize>> = Vec::new();
    for range in ranges {
        if let Some(last) = merged.last_mut() {
            let overlaps = range.start < last.end;
            let same_addition = last.is_empty() && range.is_empty() && range.start == last.start;
            if overlaps || same_addition {
                last.end = last.end.max(range.end);
                continue;
            }
        }
        merged.push(range);
    }

    merged
}

/// 1-based index of the word sequence at `start` among identical sequences in
/// the verse, or 0 when it occurs only once.
fn occurrence_of(keys: &[String], start: usize, len: usize) -> u32 {
    if len == 0 || start + len > keys.len() {
        return 0;
    }

    let target = &keys[start..start + len];
    let positions: Vec<usize> = (0..=keys.len() - len)
        .filter(|&k| &keys[k..k + len] == target)
        .collect();

    if positions.len() <= 1 {
        return 0;
    }
    positions
        .iter()
        .position(|&k| k == start)
        .map(|idx| idx as u32 + 1)
        .unwrap_or(0)
}

/// Collate one verse. `witnesses` holds `None` for translations without chapter text.
fn collate_verse(
    book: &str,
    chapter_number: u32,
    label: &str,
    base: &[&str],
    witnesses: &[Option<Witness<'_>>],
    params: &RenderParams,
) -> Vec<ApparatusRow> {
    let keys: Vec<String> = base
        .iter()
        .map(|w| normalize(w, params.interlinear_mode))
        .collect();
    let ranges = union_spans(witnesses.iter().flatten().flat_map(|w| w.spans.iter()));

    let as_cell = |words: Vec<&str>| {
        if words.is_empty() {
            params.omission_marker.clone()
        } else {
            words.join(" ")
        }
    };

    let mut rows = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (phrase, occurrence, variants) = if !range.is_empty() {
            let variants = witnesses
                .iter()
                .map(|w| w.as_ref().map(|w| as_cell(w.reading_over(range.clone(), base))))
                .collect();
            (
                base[range.clone()].join(" "),
                occurrence_of(&keys, range.start, range.len()),
                variants,
            )
        } else if params.render_neighbour_for_addition && !base.is_empty() {
            let point = range.start;
            let anchor = if point > 0 { point - 1 } else { 0 };
            let variants = witnesses
                .iter()
                .map(|w| {
                    w.as_ref().map(|w| {
                        let neighbour = w.reading_over(anchor..anchor + 1, base);
                        let added = w.addition_at(point);
                        let words = if point > 0 {
                            [neighbour, added].concat()
                        } else {
                            [added, neighbour].concat()
                        };
                        as_cell(words)
                    })
                })
                .collect();
            (
                base[anchor].to_string(),
                occurrence_of(&keys, anchor, 1),
                variants,
            )
        } else {
            let variants = witnesses
                .iter()
                .map(|w| w.as_ref().map(|w| as_cell(w.addition_at(range.start))))
                .collect();
            (String::new(), 0, variants)
        };

        rows.push(ApparatusRow {
            book: book.to_string(),
            chapter_number,
            verse: label.to_string(),
            phrase,
            occurrence,
            variants,
        });
    }

    rows
}

/// Collate one chapter of the base text against the comparison chapters.
///
/// `comparisons` is in column order; an empty comparison chapter yields blank
/// cells. Only verses inside `passage` are collated. An empty base chapter yields
/// no rows.
pub fn collate_chapter(
    base: &Chapter,
    comparisons: &[Chapter],
    passage: &PassageReference,
    params: &RenderParams,
    align_params: &AlignParams,
) -> Vec<ApparatusRow> {
    if base.is_empty() {
        return Vec::new();
    }

    let book = base.reference.book();
    let chapter_number = base.reference.chapter_number();
    let comparison_verses: Vec<Option<HashMap<String, String>>> = comparisons
        .iter()
        .map(|chapter| {
            if chapter.is_empty() {
                None
            } else {
                Some(
                    chapter
                        .verses()
                        .into_iter()
                        .map(|v| (v.label, v.text))
                        .collect(),
                )
            }
        })
        .collect();

    let mut rows = Vec::new();
    for verse in base.verses() {
        if !passage.contains_verse(&verse.label) {
            continue;
        }

        let base_words = tokenize(&verse.text);
        let witnesses: Vec<Option<Witness<'_>>> = comparison_verses
            .iter()
            .map(|verses| {
                verses.as_ref().map(|verses| {
                    let text = verses.get(&verse.label).map(String::as_str).unwrap_or("");
                    let words = tokenize(text);
                    let alignment =
                        align_words(&base_words, &words, params.interlinear_mode, align_params);
                    Witness {
                        spans: variant_spans(&alignment),
                        matched: alignment.matched_words(base_words.len()),
                        words,
                    }
                })
            })
            .collect();

        rows.extend(collate_verse(
            book,
            chapter_number,
            &verse.label,
            &base_words,
            &witnesses,
            params,
        ));
    }

    rows
}

/// Fetch and collate every chapter of a request, returning rows in apparatus order.
///
/// The base text comes from `primary`, the comparison texts from `secondary`.
pub fn generate_apparatus(
    primary: &Provider,
    secondary: &Provider,
    request: &ApparatusRequest,
    canon: &Canon,
    params: &RenderParams,
    align_params: &AlignParams,
    show_progress: bool,
) -> Result<ApparatusTable, ProviderError> {
    let reference = &request.passage.chapter_reference;
    let book = reference.book();
    let chapters: Vec<u32> = if reference.chapter_number() == 0 {
        (1..=canon.get_number_of_chapters(book)).collect()
    } else {
        vec![reference.chapter_number()]
    };

    if show_progress {
        eprintln!(
            "Collating {} against {} ({} chapter(s))...",
            request.base,
            request.comparisons.join(", "),
            chapters.len()
        );
    }

    let progress = if show_progress {
        let pb = ProgressBar::new(chapters.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chapters")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    } else {
        None
    };

    let per_chapter: Vec<Vec<ApparatusRow>> = chapters
        .par_iter()
        .map(|&chapter_number| {
            let base = primary.get_chapter(&request.base, book, chapter_number, canon)?;
            if base.is_empty() {
                warn!(book, chapter_number, translation = %request.base, "no base text, skipping chapter");
            }

            let comparisons = request
                .comparisons
                .iter()
                .map(|translation| secondary.get_chapter(translation, book, chapter_number, canon))
                .collect::<Result<Vec<_>, _>>()?;
            for chapter in comparisons.iter().filter(|c| c.is_empty()) {
                debug!(book, chapter_number, translation = %chapter.translation, "no comparison text");
            }

            let rows = collate_chapter(&base, &comparisons, &request.passage, params, align_params);
            debug!(book, chapter_number, rows = rows.len(), "collated chapter");

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
            Ok::<_, ProviderError>(rows)
        })
        .collect::<Result<_, ProviderError>>()?;

    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }

    let mut table = ApparatusTable::new(request.comparisons.clone());
    table.rows = per_chapter.into_iter().flatten().collect();
    sort_rows(canon, &mut table.rows);

    if show_progress {
        eprintln!("  Apparatus rows: {}", table.rows.len());
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InterlinearMode;
    use crate::reference::ChapterReference;

    fn chapter(translation: &str, book: &str, number: u32, text: &str) -> Chapter {
        Chapter {
            text: text.to_string(),
            ..Chapter::empty(translation, ChapterReference::new(book, number))
        }
    }

    fn collate(base: &str, others: &[&str], params: &RenderParams) -> Vec<ApparatusRow> {
        let base = chapter("BASE", "1 John", 1, base);
        let others: Vec<Chapter> = others
            .iter()
            .enumerate()
            .map(|(i, text)| chapter(&format!("T{}", i), "1 John", 1, text))
            .collect();
        collate_chapter(
            &base,
            &others,
            &PassageReference::parse("1 John 1"),
            params,
            &AlignParams::default(),
        )
    }

    fn cells(row: &ApparatusRow) -> Vec<&str> {
        row.variants
            .iter()
            .map(|v| v.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn test_identical_texts_produce_no_rows() {
        let rows = collate("1  we have seen", &["1  we have seen"], &RenderParams::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_substitution_row_with_all_columns() {
        let params = RenderParams {
            interlinear_mode: InterlinearMode::IGNORES_CASE,
            ..Default::default()
        };
        let rows = collate(
            "3  we declare this unto you",
            &[
                "3  we declare this unto you",
                "3  we declare This unto you",
                "3  we declare that unto you",
            ],
            &params,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].verse, "3");
        assert_eq!(rows[0].phrase, "this");
        assert_eq!(cells(&rows[0]), vec!["this", "This", "that"]);
    }

    #[test]
    fn test_omission_uses_marker() {
        let rows = collate("1  that which was", &["1  that was"], &RenderParams::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].phrase, "which");
        assert_eq!(cells(&rows[0]), vec!["om."]);
    }

    #[test]
    fn test_missing_verse_is_omitted_entirely() {
        let rows = collate("1  a b\n2  c d", &["1  a b"], &RenderParams::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].verse, "2");
        assert_eq!(rows[0].phrase, "c d");
        assert_eq!(cells(&rows[0]), vec!["om."]);
    }

    #[test]
    fn test_addition_without_neighbour() {
        let rows = collate("1  a b c", &["1  a b x c", "1  a b c"], &RenderParams::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].phrase, "");
        assert_eq!(rows[0].occurrence, 0);
        assert_eq!(cells(&rows[0]), vec!["x", "om."]);
    }

    #[test]
    fn test_addition_with_neighbour() {
        let params = RenderParams {
            render_neighbour_for_addition: true,
            ..Default::default()
        };
        let rows = collate("1  a b c", &["1  a b x c", "1  a b c"], &params);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].phrase, "b");
        assert_eq!(cells(&rows[0]), vec!["b x", "b"]);

        let rows = collate("1  a b c", &["1  x a b c"], &params);
        assert_eq!(rows[0].phrase, "a");
        assert_eq!(cells(&rows[0]), vec!["x a"]);
    }

    #[test]
    fn test_overlapping_spans_merge() {
        let rows = collate(
            "1  one two three four",
            &["1  one TWO three four", "1  one two THREE four"],
            &RenderParams::default(),
        );
        assert_eq!(rows.len(), 2);

        let rows = collate(
            "1  one two three four",
            &["1  one TWO THREE four", "1  one two THREE four"],
            &RenderParams::default(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].phrase, "two three");
        assert_eq!(cells(&rows[0]), vec!["TWO THREE", "two THREE"]);
    }

    #[test]
    fn test_occurrence_numbers() {
        let rows = collate(
            "1  and God said and God saw",
            &["1  and God spoke and the Lord saw"],
            &RenderParams::default(),
        );
        let god = rows.iter().find(|r| r.phrase == "God").unwrap();
        assert_eq!(god.occurrence, 2);
        let said = rows.iter().find(|r| r.phrase == "said").unwrap();
        assert_eq!(said.occurrence, 0);
    }

    #[test]
    fn test_missing_comparison_chapter_is_blank() {
        let rows = collate("1  a b", &["", "1  a c"], &RenderParams::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].variants, vec![None, Some("c".to_string())]);
    }

    #[test]
    fn test_empty_base_yields_no_rows() {
        assert!(collate("", &["1  a"], &RenderParams::default()).is_empty());
    }

    #[test]
    fn test_passage_filters_verses() {
        let base = chapter("BASE", "1 John", 1, "1  a\n2  b\n3  c");
        let other = chapter("T0", "1 John", 1, "1  x\n2  y\n3  z");
        let rows = collate_chapter(
            &base,
            &[other],
            &PassageReference::parse("1 John 1:2-3"),
            &RenderParams::default(),
            &AlignParams::default(),
        );
        let verses: Vec<&str> = rows.iter().map(|r| r.verse.as_str()).collect();
        assert_eq!(verses, vec!["2", "3"]);
    }

    #[test]
    fn test_union_spans() {
        let span = |b: Range<usize>| VariantSpan { base: b, other: 0..0 };
        let spans = [span(3..3), span(1..2), span(1..1), span(2..5), span(3..3), span(6..6), span(6..6)];
        assert_eq!(union_spans(spans.iter()), vec![1..1, 1..2, 2..5, 6..6]);
    }
}
