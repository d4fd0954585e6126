//! Global word alignment between two renderings of a verse.
//!
//! Needleman-Wunsch over whitespace tokens. Tokens are compared after
//! normalization, so the interlinear mode decides which differences count.

use std::ops::Range;

use crate::models::{AlignParams, InterlinearMode};
use crate::normalize::normalize;

/// One step of an alignment between a base text and another text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOp {
    /// Base word `i` and other word `j` are the same reading.
    Match(usize, usize),
    /// Base word `i` is replaced by other word `j`.
    Substitute(usize, usize),
    /// Base word `i` is absent from the other text.
    Omit(usize),
    /// Other word `j` has no counterpart in the base text.
    Add(usize),
}

/// Result of aligning two word sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAlignment {
    pub ops: Vec<AlignOp>,
    pub matches: u32,
    pub substitutions: u32,
    pub gaps: u32,
    pub score: i32,
}

impl WordAlignment {
    /// For every base word, the index of the other word it matched.
    pub fn matched_words(&self, base_len: usize) -> Vec<Option<usize>> {
        let mut matched = vec![None; base_len];
        for op in &self.ops {
            if let AlignOp::Match(i, j) = *op {
                if i < base_len {
                    matched[i] = Some(j);
                }
            }
        }
        matched
    }

    pub fn is_identical(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, AlignOp::Match(..)))
    }
}

/// A maximal run of non-matching operations.
///
/// `base` is empty for a pure addition; `other` is empty for a pure omission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSpan {
    pub base: Range<usize>,
    pub other: Range<usize>,
}

impl VariantSpan {
    pub fn is_addition(&self) -> bool {
        self.base.is_empty()
    }
}

/// Split a verse into words.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Needleman-Wunsch global alignment of two word sequences.
///
/// Ties in the traceback prefer the diagonal, then an omission, then an addition.
pub fn align_words(
    base: &[&str],
    other: &[&str],
    mode: InterlinearMode,
    params: &AlignParams,
) -> WordAlignment {
    let keys_a: Vec<String> = base.iter().map(|w| normalize(w, mode)).collect();
    let keys_b: Vec<String> = other.iter().map(|w| normalize(w, mode)).collect();
    let n = keys_a.len();
    let m = keys_b.len();

    // DP matrix - flat Vec, H[i][j] = h[i * (m+1) + j]
    let width = m + 1;
    let mut h = vec![0i32; (n + 1) * width];
    for i in 1..=n {
        h[i * width] = i as i32 * params.gap_penalty;
    }
    for j in 1..=m {
        h[j] = j as i32 * params.gap_penalty;
    }

    let pair_score = |i: usize, j: usize| {
        if keys_a[i] == keys_b[j] {
            params.match_score
        } else {
            params.mismatch_penalty
        }
    };

    for i in 1..=n {
        let row_offset = i * width;
        let prev_row_offset = (i - 1) * width;

        for j in 1..=m {
            let diagonal = h[prev_row_offset + (j - 1)] + pair_score(i - 1, j - 1);
            let up = h[prev_row_offset + j] + params.gap_penalty;
            let left = h[row_offset + (j - 1)] + params.gap_penalty;
            h[row_offset + j] = diagonal.max(up).max(left);
        }
    }

    // Traceback from the bottom-right corner
    let mut ops = Vec::with_capacity(n.max(m));
    let mut matches = 0u32;
    let mut substitutions = 0u32;
    let mut gaps = 0u32;
    let mut i = n;
    let mut j = m;

    while i > 0 || j > 0 {
        let current = h[i * width + j];

        if i > 0 && j > 0 && current == h[(i - 1) * width + (j - 1)] + pair_score(i - 1, j - 1) {
            if keys_a[i - 1] == keys_b[j - 1] {
                matches += 1;
                ops.push(AlignOp::Match(i - 1, j - 1));
            } else {
                substitutions += 1;
                ops.push(AlignOp::Substitute(i - 1, j - 1));
            }
            i -= 1;
            j -= 1;
        } else if i > 0 && current == h[(i - 1) * width + j] + params.gap_penalty {
            gaps += 1;
            ops.push(AlignOp::Omit(i - 1));
            i -= 1;
        } else {
            gaps += 1;
            ops.push(AlignOp::Add(j - 1));
            j -= 1;
        }
    }

    // Built backwards
    ops.reverse();

    WordAlignment {
        ops,
        matches,
        substitutions,
        gaps,
        score: h[n * width + m],
    }
}

/// Group an alignment's non-matching operations into maximal spans.
pub fn variant_spans(alignment: &WordAlignment) -> Vec<VariantSpan> {
    let mut spans = Vec::new();
    let mut current: Option<VariantSpan> = None;
    let mut base_pos = 0usize;
    let mut other_pos = 0usize;

    for op in &alignment.ops {
        let (base_step, other_step) = match op {
            AlignOp::Match(..) | AlignOp::Substitute(..) => (1, 1),
            AlignOp::Omit(_) => (1, 0),
            AlignOp::Add(_) => (0, 1),
        };

        if matches!(op, AlignOp::Match(..)) {
            if let Some(span) = current.take() {
                spans.push(span);
            }
        } else {
            let span = current.get_or_insert(VariantSpan {
                base: base_pos..base_pos,
                other: other_pos..other_pos,
            });
            span.base.end += base_step;
            span.other.end += other_step;
        }

        base_pos += base_step;
        other_pos += other_step;
    }

    if let Some(span) = current {
        spans.push(span);
    }

    spans
}
