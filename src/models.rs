//! Data structures shared across the apparatus pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::reference::ChapterReference;

/// Number of fixed metadata columns before the translation columns
/// (Book, Chapter, Verse, Phrase, Occurrence).
pub const FIXED_COLUMNS: usize = 5;

/// Header names of the fixed metadata columns, in order.
pub const FIXED_COLUMN_NAMES: [&str; FIXED_COLUMNS] =
    ["Book", "Chapter", "Verse", "Phrase", "Occurrence"];

/// Placeholder substituted with the occurrence number in the occurrence marker.
pub const OCCURRENCE_PLACEHOLDER: &str = "%OCCURRENCE%";

/// Normalization flags controlling which differences count as variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterlinearMode(u8);

impl InterlinearMode {
    pub const NONE: Self = Self(0);
    pub const IGNORES_CASE: Self = Self(1);
    pub const IGNORES_DIACRITICS: Self = Self(1 << 1);
    pub const IGNORES_PUNCTUATION: Self = Self(1 << 2);

    /// Build a mode from the three individual settings.
    pub fn from_flags(ignores_case: bool, ignores_diacritics: bool, ignores_punctuation: bool) -> Self {
        let mut mode = Self::NONE;
        if ignores_case {
            mode |= Self::IGNORES_CASE;
        }
        if ignores_diacritics {
            mode |= Self::IGNORES_DIACRITICS;
        }
        if ignores_punctuation {
            mode |= Self::IGNORES_PUNCTUATION;
        }
        mode
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for InterlinearMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InterlinearMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One line of the apparatus: a base phrase and its reading in every comparison translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApparatusRow {
    pub book: String,
    pub chapter_number: u32,
    pub verse: String,
    pub phrase: String,
    pub occurrence: u32,
    /// One entry per comparison translation; `None` means no data (blank cell).
    pub variants: Vec<Option<String>>,
}

/// An apparatus: the comparison translation sigla plus the rows aligned to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApparatusTable {
    pub translations: Vec<String>,
    pub rows: Vec<ApparatusRow>,
}

impl ApparatusTable {
    pub fn new(translations: Vec<String>) -> Self {
        Self {
            translations,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single verse of chapter text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub label: String,
    pub text: String,
}

/// Chapter text as delivered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub translation: String,
    pub reference: ChapterReference,
    /// Plain lines of `"<verse-label>  <verse text>"`, one verse per line.
    pub text: String,
    pub copyright: String,
    pub previous: ChapterReference,
    pub next: ChapterReference,
    pub supports_italics: bool,
}

impl Chapter {
    /// A chapter with no text, used when the provider has nothing for the request.
    pub fn empty(translation: &str, reference: ChapterReference) -> Self {
        Chapter {
            translation: translation.to_string(),
            reference,
            text: String::new(),
            copyright: String::new(),
            previous: ChapterReference::invalid(),
            next: ChapterReference::invalid(),
            supports_italics: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Split the chapter text into verses.
    ///
    /// A line whose first token does not start with a digit continues the
    /// previous verse.
    pub fn verses(&self) -> Vec<Verse> {
        let mut verses: Vec<Verse> = Vec::new();

        for line in self.text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (head, rest) = match line.find(char::is_whitespace) {
                Some(pos) => (&line[..pos], line[pos..].trim()),
                None => (line, ""),
            };

            if head.starts_with(|c: char| c.is_ascii_digit()) {
                verses.push(Verse {
                    label: head.to_string(),
                    text: rest.to_string(),
                });
            } else if let Some(last) = verses.last_mut() {
                if !last.text.is_empty() {
                    last.text.push(' ');
                }
                last.text.push_str(line);
            }
        }

        verses
    }
}

/// Output format of a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    Text,
    Html,
    Accordance,
    /// HTML critical apparatus (default)
    #[default]
    Apparatus,
    /// Flat CSV in the interchange format
    Spreadsheet,
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderFormat::Text => "text",
            RenderFormat::Html => "html",
            RenderFormat::Accordance => "accordance",
            RenderFormat::Apparatus => "apparatus",
            RenderFormat::Spreadsheet => "spreadsheet",
        };
        f.write_str(name)
    }
}

/// Rendering parameters, built once per render call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderParams {
    pub format: RenderFormat,
    pub interlinear_mode: InterlinearMode,
    /// Template appended after a repeated phrase; `%OCCURRENCE%` is replaced by the number.
    pub occurrence_marker: String,
    /// Text shown where a reading has no words.
    pub omission_marker: String,
    /// Anchor additions to the neighbouring base word.
    pub render_neighbour_for_addition: bool,
    pub font_family: String,
    pub font_size: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            format: RenderFormat::Apparatus,
            interlinear_mode: InterlinearMode::NONE,
            occurrence_marker: format!("({})", OCCURRENCE_PLACEHOLDER),
            omission_marker: "om.".to_string(),
            render_neighbour_for_addition: false,
            font_family: "Cardo, 'Times New Roman', serif".to_string(),
            font_size: 12.0,
        }
    }
}

impl RenderParams {
    /// Occurrence marker with the number substituted in.
    pub fn occurrence_label(&self, occurrence: u32) -> String {
        self.occurrence_marker
            .replace(OCCURRENCE_PLACEHOLDER, &occurrence.to_string())
    }
}

/// Scoring parameters for word alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignParams {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_penalty: i32,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch_penalty: -1,
            gap_penalty: -1,
        }
    }
}
