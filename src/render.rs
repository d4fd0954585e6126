//! Apparatus rendering (HTML, plain text, Accordance notes, CSV) and JSON export.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::canon::Canon;
use crate::csv::serialize_apparatus;
use crate::models::{ApparatusRow, ApparatusTable, InterlinearMode, RenderFormat, RenderParams};
use crate::normalize::normalize;

/// Rows rendered between checks of the cancellation flag.
const CANCEL_CHECK_INTERVAL: usize = 256;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rendering cancelled")]
    Cancelled,
}

/// Render an apparatus in the format named by `params`.
///
/// Rows are expected in apparatus order (see `compare::sort_rows`).
pub fn render_apparatus(table: &ApparatusTable, params: &RenderParams) -> Result<String, RenderError> {
    render_apparatus_with_cancel(table, params, &AtomicBool::new(false))
}

/// Render an apparatus, stopping with `RenderError::Cancelled` once `cancel` is set.
pub fn render_apparatus_with_cancel(
    table: &ApparatusTable,
    params: &RenderParams,
    cancel: &AtomicBool,
) -> Result<String, RenderError> {
    let markup = match params.format {
        RenderFormat::Html | RenderFormat::Apparatus => Markup::Html,
        RenderFormat::Text => Markup::Text,
        RenderFormat::Accordance => Markup::Accordance,
        RenderFormat::Spreadsheet => {
            if cancel.load(Ordering::Relaxed) {
                return Err(RenderError::Cancelled);
            }
            return Ok(serialize_apparatus(table));
        }
    };

    let mut renderer = Renderer::new(markup, params, Canon::with_deuterocanon());
    for (i, row) in table.rows.iter().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return Err(RenderError::Cancelled);
        }
        renderer.push_row(row, &table.translations);
    }
    let body = renderer.finish();

    Ok(match markup {
        Markup::Html => html_document(&body, params),
        Markup::Text | Markup::Accordance => body,
    })
}

/// Write a rendered apparatus.
pub fn write_apparatus<W: Write>(
    table: &ApparatusTable,
    params: &RenderParams,
    writer: &mut W,
) -> Result<(), RenderError> {
    let rendered = render_apparatus(table, params)?;
    writer.write_all(rendered.as_bytes())?;
    Ok(())
}

/// Write a rendered apparatus to a file.
pub fn write_apparatus_file(
    table: &ApparatusTable,
    params: &RenderParams,
    path: &Path,
) -> Result<(), RenderError> {
    let mut file = std::fs::File::create(path)?;
    write_apparatus(table, params, &mut file)
}

/// Write an apparatus table as JSON.
pub fn write_json<W: Write>(table: &ApparatusTable, writer: &mut W) -> Result<(), RenderError> {
    let json = serde_json::to_string_pretty(table)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write an apparatus table as JSON to a file.
pub fn write_json_file(table: &ApparatusTable, path: &Path) -> Result<(), RenderError> {
    let mut file = std::fs::File::create(path)?;
    write_json(table, &mut file)
}

/// Write a summary report to stdout.
pub fn print_summary(table: &ApparatusTable, params: &RenderParams) {
    let mut verses: Vec<(&str, u32, &str)> = table
        .rows
        .iter()
        .map(|r| (r.book.as_str(), r.chapter_number, r.verse.as_str()))
        .collect();
    verses.dedup();

    println!("\n=== Apparatus Summary ===");
    println!("Translations: {}", table.translations.join(", "));
    println!("Format: {}", params.format);
    println!("Interlinear mode:");
    println!("  Ignores case: {}", params.interlinear_mode.contains(InterlinearMode::IGNORES_CASE));
    println!(
        "  Ignores diacritics: {}",
        params.interlinear_mode.contains(InterlinearMode::IGNORES_DIACRITICS)
    );
    println!(
        "  Ignores punctuation: {}",
        params.interlinear_mode.contains(InterlinearMode::IGNORES_PUNCTUATION)
    );
    println!();
    println!("Results:");
    println!("  Rows: {}", table.rows.len());
    println!("  Verses with variants: {}", verses.len());
}

/// Group a row's readings by normalized value, keeping first-seen order.
///
/// Each group holds the first reading seen and the sigla sharing it. Blank cells
/// are skipped.
pub fn group_variants<'a>(
    row: &'a ApparatusRow,
    translations: &'a [String],
    mode: InterlinearMode,
) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut groups: Vec<(String, &str, Vec<&str>)> = Vec::new();

    for (reading, siglum) in row.variants.iter().zip(translations) {
        let Some(reading) = reading.as_deref().filter(|r| !r.trim().is_empty()) else {
            continue;
        };
        let key = normalize(reading, mode);
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, sigla)) => sigla.push(siglum.as_str()),
            None => groups.push((key, reading, vec![siglum.as_str()])),
        }
    }

    groups
        .into_iter()
        .map(|(_, reading, sigla)| (reading, sigla))
        .collect()
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Markup {
    Html,
    Text,
    Accordance,
}

/// Streams rows into markup while tracking the current book, chapter and verse.
struct Renderer<'a> {
    markup: Markup,
    params: &'a RenderParams,
    canon: &'a Canon,
    out: String,
    book: Option<String>,
    chapter: u32,
    verse: Option<String>,
    /// An HTML paragraph or a text line is open.
    open: bool,
}

impl<'a> Renderer<'a> {
    fn new(markup: Markup, params: &'a RenderParams, canon: &'a Canon) -> Self {
        Self {
            markup,
            params,
            canon,
            out: String::new(),
            book: None,
            chapter: 0,
            verse: None,
            open: false,
        }
    }

    fn push_row(&mut self, row: &ApparatusRow, translations: &[String]) {
        let new_book = self.book.as_deref() != Some(row.book.as_str());
        let new_verse = new_book
            || self.chapter != row.chapter_number
            || self.verse.as_deref() != Some(row.verse.as_str());

        if new_book {
            self.start_book(&row.book);
        }
        if new_verse {
            self.start_verse(row);
        } else {
            self.out.push_str(" | ");
        }

        let entry = self.entry(row, translations);
        self.out.push_str(&entry);

        self.book = Some(row.book.clone());
        self.chapter = row.chapter_number;
        self.verse = Some(row.verse.clone());
    }

    fn start_book(&mut self, book: &str) {
        match self.markup {
            Markup::Html => {
                if self.open {
                    self.out.push_str("</p>\n");
                }
                let _ = write!(self.out, "<h2>{}</h2>\n<p>", escape_html(book));
                self.open = true;
            }
            Markup::Text => {
                if self.open {
                    self.out.push('\n');
                    self.open = false;
                }
                if !self.out.is_empty() {
                    self.out.push('\n');
                }
                self.out.push_str(book);
                self.out.push('\n');
            }
            Markup::Accordance => {}
        }
    }

    fn start_verse(&mut self, row: &ApparatusRow) {
        let label = self.verse_label(row);
        match self.markup {
            Markup::Html => {
                if !self.out.ends_with("<p>") {
                    self.out.push(' ');
                }
                let _ = write!(self.out, "<sup>{}</sup> ", escape_html(&label));
            }
            Markup::Text => {
                if self.open {
                    self.out.push('\n');
                }
                let _ = write!(self.out, "{} ", label);
                self.open = true;
            }
            Markup::Accordance => {
                if self.open {
                    self.out.push('\n');
                }
                let _ = write!(self.out, "{} {} ", row.book, label);
                self.open = true;
            }
        }
    }

    /// "chapter:verse", or the verse alone for one-chapter books.
    fn verse_label(&self, row: &ApparatusRow) -> String {
        if self.canon.is_one_chapter_book(&row.book) {
            row.verse.clone()
        } else {
            format!("{}:{}", row.chapter_number, row.verse)
        }
    }

    fn entry(&self, row: &ApparatusRow, translations: &[String]) -> String {
        let phrase = if row.phrase.is_empty() {
            self.params.omission_marker.as_str()
        } else {
            row.phrase.as_str()
        };

        let mut entry = match self.markup {
            Markup::Html => format!("<b>{}</b>", escape_html(phrase)),
            Markup::Text | Markup::Accordance => phrase.to_string(),
        };
        if row.occurrence > 0 {
            entry.push_str(&self.params.occurrence_label(row.occurrence));
        }
        if self.markup != Markup::Html {
            entry.push(']');
        }

        let variants: Vec<String> = group_variants(row, translations, self.params.interlinear_mode)
            .into_iter()
            .map(|(reading, sigla)| {
                let text = format!("{} {}", reading, sigla.join(" "));
                match self.markup {
                    Markup::Html => escape_html(&text),
                    Markup::Text | Markup::Accordance => text,
                }
            })
            .collect();
        if !variants.is_empty() {
            entry.push(' ');
            entry.push_str(&variants.join("; "));
        }

        entry
    }

    fn finish(mut self) -> String {
        if self.open {
            match self.markup {
                Markup::Html => self.out.push_str("</p>\n"),
                Markup::Text | Markup::Accordance => self.out.push('\n'),
            }
        }
        self.out
    }
}

fn html_document(body: &str, params: &RenderParams) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>Critical Apparatus</title>\n\
         <style>\n\
         body {{ font-family: {}; font-size: {}pt; }}\n\
         h2 {{ font-size: 1.2em; margin: 1em 0 0.5em; }}\n\
         sup {{ font-weight: bold; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         {}</body>\n\
         </html>\n",
        escape_html(&params.font_family),
        params.font_size,
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(book: &str, chapter: u32, verse: &str, phrase: &str, variants: &[Option<&str>]) -> ApparatusRow {
        ApparatusRow {
            book: book.to_string(),
            chapter_number: chapter,
            verse: verse.to_string(),
            phrase: phrase.to_string(),
            occurrence: 0,
            variants: variants.iter().map(|v| v.map(str::to_string)).collect(),
        }
    }

    fn table(translations: &[&str], rows: Vec<ApparatusRow>) -> ApparatusTable {
        ApparatusTable {
            translations: translations.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    fn params(format: RenderFormat) -> RenderParams {
        RenderParams {
            format,
            ..Default::default()
        }
    }

    #[test]
    fn test_case_insensitive_grouping() {
        let apparatus = table(
            &["A", "B", "C"],
            vec![row("1 John", 1, "3", "this", &[Some("this"), Some("This"), Some("that")])],
        );
        let params = RenderParams {
            interlinear_mode: InterlinearMode::IGNORES_CASE,
            ..params(RenderFormat::Apparatus)
        };

        let html = render_apparatus(&apparatus, &params).unwrap();
        assert!(html.contains("<h2>1 John</h2>"));
        assert!(html.contains("<sup>1:3</sup> <b>this</b> this A B; that C"));

        let strict = render_apparatus(&apparatus, &RenderParams::default()).unwrap();
        assert!(strict.contains("this A; This B; that C"));
    }

    #[test]
    fn test_one_chapter_book_prints_verse_only() {
        let apparatus = table(&["A"], vec![row("Philemon", 1, "6", "faith", &[Some("belief")])]);
        for format in [RenderFormat::Html, RenderFormat::Text, RenderFormat::Accordance] {
            let out = render_apparatus(&apparatus, &params(format)).unwrap();
            assert!(!out.contains("1:6"), "{format}: {out}");
        }
        let text = render_apparatus(&apparatus, &params(RenderFormat::Text)).unwrap();
        assert_eq!(text, "Philemon\n6 faith] belief A\n");
    }

    #[test]
    fn test_same_verse_entries_join_with_bar() {
        let apparatus = table(
            &["A"],
            vec![
                row("Jude", 1, "5", "Lord", &[Some("Jesus")]),
                row("Jude", 1, "5", "once", &[Some("om.")]),
                row("Jude", 1, "6", "angels", &[Some("messengers")]),
            ],
        );
        let text = render_apparatus(&apparatus, &params(RenderFormat::Text)).unwrap();
        assert_eq!(
            text,
            "Jude\n5 Lord] Jesus A | once] om. A\n6 angels] messengers A\n"
        );
    }

    #[test]
    fn test_book_change_closes_paragraph() {
        let apparatus = table(
            &["A"],
            vec![
                row("Genesis", 1, "1", "God", &[Some("god")]),
                row("Genesis", 2, "1", "host", &[Some("army")]),
                row("Exodus", 1, "1", "names", &[Some("name")]),
            ],
        );
        let html = render_apparatus(&apparatus, &params(RenderFormat::Html)).unwrap();
        assert!(html.contains(
            "<h2>Genesis</h2>\n<p><sup>1:1</sup> <b>God</b> god A <sup>2:1</sup> <b>host</b> army A</p>\n<h2>Exodus</h2>\n<p>"
        ));
        assert_eq!(html.matches("<p>").count(), html.matches("</p>").count());
    }

    #[test]
    fn test_occurrence_and_omission_markers() {
        let mut repeated = row("Genesis", 1, "27", "God", &[Some("he")]);
        repeated.occurrence = 2;
        let apparatus = table(&["A"], vec![repeated, row("Genesis", 1, "28", "", &[Some("and")])]);

        let text = render_apparatus(&apparatus, &params(RenderFormat::Text)).unwrap();
        assert!(text.contains("27 God(2)] he A"));
        assert!(text.contains("28 om.] and A"));
    }

    #[test]
    fn test_blank_cells_skipped() {
        let apparatus = table(&["A", "B"], vec![row("Jude", 1, "1", "servant", &[None, Some("slave")])]);
        let accordance = render_apparatus(&apparatus, &params(RenderFormat::Accordance)).unwrap();
        assert_eq!(accordance, "Jude 1 servant] slave B\n");
    }

    #[test]
    fn test_html_escaping_and_style() {
        let apparatus = table(&["A&B"], vec![row("Jude", 1, "9", "<said>", &[Some("\"spoke\"")])]);
        let params = RenderParams {
            font_size: 14.0,
            ..params(RenderFormat::Html)
        };
        let html = render_apparatus(&apparatus, &params).unwrap();
        assert!(html.contains("<b>&lt;said&gt;</b> &quot;spoke&quot; A&amp;B"));
        assert!(html.contains("font-size: 14pt"));
    }

    #[test]
    fn test_empty_input_renders_empty_body() {
        let apparatus = table(&["A"], Vec::new());
        let html = render_apparatus(&apparatus, &params(RenderFormat::Html)).unwrap();
        assert!(html.contains("<body>\n</body>"));
        assert_eq!(render_apparatus(&apparatus, &params(RenderFormat::Text)).unwrap(), "");
    }

    #[test]
    fn test_spreadsheet_is_interchange_csv() {
        let apparatus = table(&["A"], vec![row("Jude", 1, "1", "a, b", &[Some("c")])]);
        let csv = render_apparatus(&apparatus, &params(RenderFormat::Spreadsheet)).unwrap();
        assert_eq!(csv, "Book,Chapter,Verse,Phrase,Occurrence,A\nJude,1,1,\"a, b\",0,c\n");
    }

    #[test]
    fn test_cancelled() {
        let apparatus = table(&["A"], vec![row("Jude", 1, "1", "a", &[Some("b")])]);
        let cancel = AtomicBool::new(true);
        let result = render_apparatus_with_cancel(&apparatus, &RenderParams::default(), &cancel);
        assert!(matches!(result, Err(RenderError::Cancelled)));
    }

    #[test]
    fn test_write_json() {
        let apparatus = table(&["A"], vec![row("Jude", 1, "1", "a", &[None])]);
        let mut buf = Vec::new();
        write_json(&apparatus, &mut buf).unwrap();
        let back: ApparatusTable = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, apparatus);
    }
}
