//! Scripture Critical Apparatus Generator
//!
//! Aligns scripture translations verse by verse and renders the variants as a
//! critical apparatus (HTML, plain text, Accordance notes or CSV).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use scripture_apparatus::prelude::*;

#[derive(Parser)]
#[command(name = "scripture-apparatus")]
#[command(about = "Critical apparatus generator for scripture translations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output format (CLI version, mirrors models::RenderFormat)
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliFormat {
    /// Plain text, one line per verse
    Text,
    /// Self-contained HTML document
    Html,
    /// Accordance user-notes lines
    Accordance,
    /// HTML critical apparatus (default)
    Apparatus,
    /// CSV in the interchange format
    Spreadsheet,
}

impl From<CliFormat> for RenderFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Text => RenderFormat::Text,
            CliFormat::Html => RenderFormat::Html,
            CliFormat::Accordance => RenderFormat::Accordance,
            CliFormat::Apparatus => RenderFormat::Apparatus,
            CliFormat::Spreadsheet => RenderFormat::Spreadsheet,
        }
    }
}

/// Canon used for book ordering and navigation
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum CliCanon {
    /// 66 books
    Protestant,
    /// Protestant canon plus the deuterocanonical books (default)
    #[default]
    Deuterocanon,
    OldTestament,
    NewTestament,
}

impl CliCanon {
    fn canon(self) -> &'static Canon {
        match self {
            CliCanon::Protestant => Canon::protestant(),
            CliCanon::Deuterocanon => Canon::with_deuterocanon(),
            CliCanon::OldTestament => Canon::old_testament(),
            CliCanon::NewTestament => Canon::new_testament(),
        }
    }
}

/// Rendering options shared by `apparatus` and `render`.
///
/// Unset options inherit from the settings file, then from ApparatusSettings::default().
#[derive(clap::Args)]
struct RenderArgs {
    /// JSON settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output format [default: apparatus]
    #[arg(long, value_enum)]
    format: Option<CliFormat>,

    /// Treat readings differing only in case as the same variant
    #[arg(long)]
    ignore_case: bool,

    /// Treat readings differing only in diacritics as the same variant
    #[arg(long)]
    ignore_diacritics: bool,

    /// Treat readings differing only in punctuation as the same variant
    #[arg(long)]
    ignore_punctuation: bool,

    /// Marker after a repeated phrase; %OCCURRENCE% is replaced by the number [default: (%OCCURRENCE%)]
    #[arg(long)]
    occurrence_marker: Option<String>,

    /// Text shown for an omitted reading [default: om.]
    #[arg(long)]
    omission_marker: Option<String>,

    /// Anchor additions to the neighbouring base word
    #[arg(long)]
    neighbour_for_addition: bool,

    /// Font family for HTML output
    #[arg(long)]
    font_family: Option<String>,

    /// Font size in points for HTML output [default: 12]
    #[arg(long)]
    font_size: Option<f32>,

    /// Also write the apparatus table as JSON to `<output stem>.table.json`
    #[arg(long)]
    json: bool,

    /// Print a summary to stdout
    #[arg(long)]
    summary: bool,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

impl RenderArgs {
    /// Overlay command-line values onto the settings file (or the defaults).
    fn settings(&self) -> Result<ApparatusSettings, ConfigError> {
        let defaults = match &self.settings {
            Some(path) => load_settings(path)?,
            None => ApparatusSettings::default(),
        };

        let settings = ApparatusSettings {
            format: self.format.map(RenderFormat::from).unwrap_or(defaults.format),
            interlinear_ignores_case: self.ignore_case || defaults.interlinear_ignores_case,
            interlinear_ignores_diacritics: self.ignore_diacritics
                || defaults.interlinear_ignores_diacritics,
            interlinear_ignores_punctuation: self.ignore_punctuation
                || defaults.interlinear_ignores_punctuation,
            occurrence_marker: self
                .occurrence_marker
                .clone()
                .unwrap_or(defaults.occurrence_marker),
            omission_marker: self.omission_marker.clone().unwrap_or(defaults.omission_marker),
            render_neighbour_for_addition: self.neighbour_for_addition
                || defaults.render_neighbour_for_addition,
            font_family: self.font_family.clone().unwrap_or(defaults.font_family),
            font_size: self.font_size.unwrap_or(defaults.font_size),
            ..defaults
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Where chapter text comes from
#[derive(clap::Args)]
struct ProviderArgs {
    /// Directory of plain-text chapters: <dir>/<translation>/<book>/<chapter>.txt
    #[arg(long, conflicts_with = "database")]
    text_dir: Option<PathBuf>,

    /// SQLite database with verses and translations tables
    #[arg(long)]
    database: Option<PathBuf>,
}

impl ProviderArgs {
    fn provider(&self) -> Option<Provider> {
        if let Some(root) = &self.text_dir {
            Some(Provider::PlainText { root: root.clone() })
        } else {
            self.database
                .as_ref()
                .map(|path| Provider::Sqlite { path: path.clone() })
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an apparatus for a passage from a chapter provider
    Apparatus {
        /// Passage, e.g. "1 John 1:3,6-7", "Jude" or "Genesis 1"
        passage: String,

        #[command(flatten)]
        provider: ProviderArgs,

        /// Base translation [default: primary_translation from settings]
        #[arg(long)]
        base: Option<String>,

        /// Comparison translation (repeatable) [default: secondary_translations from settings]
        #[arg(long = "compare")]
        comparisons: Vec<String>,

        /// Output file path
        #[arg(long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t)]
        canon: CliCanon,

        #[command(flatten)]
        render: RenderArgs,

        /// Match score for alignment [default: 2]
        #[arg(long)]
        match_score: Option<i32>,

        /// Mismatch penalty for alignment [default: -1]
        #[arg(long)]
        mismatch_penalty: Option<i32>,

        /// Gap penalty for alignment [default: -1]
        #[arg(long)]
        gap_penalty: Option<i32>,
    },

    /// Render an existing apparatus table (CSV, xlsx, xls or ods)
    Render {
        /// Input table
        input: PathBuf,

        /// Output file path
        #[arg(long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t)]
        canon: CliCanon,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Parse a passage reference and show its canonical form
    Parse {
        passage: String,

        #[arg(long, value_enum, default_value_t)]
        canon: CliCanon,
    },

    /// Show the previous and next chapter
    Navigate {
        book: String,
        chapter: u32,

        #[arg(long, value_enum, default_value_t)]
        canon: CliCanon,
    },

    /// List the books of a canon
    Books {
        #[arg(long, value_enum, default_value_t)]
        canon: CliCanon,
    },

    /// List the translations a provider holds
    Translations {
        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Import plain-text chapters into a SQLite database
    Import {
        /// Directory of plain-text chapters
        #[arg(long)]
        from: PathBuf,

        /// Database to create or extend
        #[arg(long)]
        to: PathBuf,

        /// Translation to import (repeatable) [default: all]
        #[arg(long = "translation")]
        translations: Vec<String>,

        #[arg(long, value_enum, default_value_t)]
        canon: CliCanon,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apparatus {
            passage,
            provider,
            base,
            comparisons,
            output,
            canon,
            render,
            match_score,
            mismatch_penalty,
            gap_penalty,
        } => {
            let settings = render.settings()?;
            let canon = canon.canon();

            let primary = provider
                .provider()
                .or_else(|| settings.primary_provider.clone())
                .ok_or("No provider: pass --text-dir or --database, or set primary_provider")?;
            let secondary = if provider.provider().is_some() {
                primary.clone()
            } else {
                settings.comparison_provider().cloned().unwrap_or_else(|| primary.clone())
            };

            let base = base
                .or_else(|| Some(settings.primary_translation.clone()).filter(|t| !t.is_empty()))
                .ok_or("No base translation: pass --base or set primary_translation")?;
            let comparisons = if comparisons.is_empty() {
                settings.secondary_translations.clone()
            } else {
                comparisons
            };
            if comparisons.is_empty() {
                return Err("No comparison translations: pass --compare or set secondary_translations".into());
            }

            let passage = PassageReference::parse_with_canon(&passage, canon);
            if !passage.is_valid() {
                return Err("Could not parse passage reference".into());
            }

            let defaults = AlignParams::default();
            let align_params = AlignParams {
                match_score: match_score.unwrap_or(defaults.match_score),
                mismatch_penalty: mismatch_penalty.unwrap_or(defaults.mismatch_penalty),
                gap_penalty: gap_penalty.unwrap_or(defaults.gap_penalty),
            };

            let params = settings.render_params();
            let request = ApparatusRequest {
                base,
                comparisons,
                passage,
            };
            let table = generate_apparatus(
                &primary,
                &secondary,
                &request,
                canon,
                &params,
                &align_params,
                !render.quiet,
            )?;

            write_outputs(&table, &params, &output, &render)?;
        }

        Commands::Render {
            input,
            output,
            canon,
            render,
        } => {
            let params = render.settings()?.render_params();
            let mut table = load_table(&input)?;
            sort_rows(canon.canon(), &mut table.rows);

            if !render.quiet {
                eprintln!("Loaded {} rows from {}", table.rows.len(), input.display());
            }

            write_outputs(&table, &params, &output, &render)?;
        }

        Commands::Parse { passage, canon } => {
            let parsed = PassageReference::parse_with_canon(&passage, canon.canon());
            if !parsed.is_valid() {
                return Err(format!("Could not parse {:?}", passage).into());
            }

            println!("=== Passage ===");
            println!("Display: {}", parsed.display);
            println!("Book: {}", parsed.chapter_reference.book());
            println!("Chapter: {}", parsed.chapter_reference.chapter_number());
            if parsed.verses.is_empty() {
                println!("Verses: (all)");
            } else {
                println!("Verses: {}", parsed.verses.join(", "));
            }
        }

        Commands::Navigate {
            book,
            chapter,
            canon,
        } => {
            let canon = canon.canon();
            if canon.get_book_num(&book) == 0 {
                return Err(format!("Unknown book: {}", book).into());
            }

            let describe = |reference: ChapterReference| {
                if reference.is_valid() {
                    reference.to_string()
                } else {
                    "(none)".to_string()
                }
            };
            println!("Previous: {}", describe(canon.get_previous_chapter(&book, chapter)));
            println!("Next: {}", describe(canon.get_next_chapter(&book, chapter)));
        }

        Commands::Books { canon } => {
            let canon = canon.canon();
            println!("=== Canon ({} books) ===", canon.len());
            for (i, book) in canon.books().enumerate() {
                println!("{:>3}. {} ({} chapters)", i + 1, book.name, book.chapters);
            }
        }

        Commands::Translations { provider } => {
            let provider = provider
                .provider()
                .ok_or("No provider: pass --text-dir or --database")?;
            for code in provider.translations()? {
                println!("{}", code);
            }
        }

        Commands::Import {
            from,
            to,
            translations,
            canon,
            quiet,
        } => {
            let source = Provider::PlainText { root: from };
            let translations = if translations.is_empty() {
                source.translations()?
            } else {
                translations
            };
            import_into_database(&source, &translations, canon.canon(), &to, !quiet)?;
            if !quiet {
                eprintln!("\nOutput: {}", to.display());
            }
        }
    }

    Ok(())
}

/// Load a table from CSV, or from a spreadsheet by extension.
fn load_table(path: &Path) -> Result<ApparatusTable, TableError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xls" | "ods") => load_apparatus_from_spreadsheet(path),
        _ => read_csv_file(path),
    }
}

/// Sibling path for the JSON table, distinct from `output` whatever its extension.
fn json_output_path(output: &Path) -> PathBuf {
    output.with_extension("table.json")
}

fn write_outputs(
    table: &ApparatusTable,
    params: &RenderParams,
    output: &Path,
    render: &RenderArgs,
) -> Result<(), RenderError> {
    write_apparatus_file(table, params, output)?;

    if render.json {
        let json_path = json_output_path(output);
        write_json_file(table, &json_path)?;
        if !render.quiet {
            eprintln!("JSON output: {}", json_path.display());
        }
    }

    if render.summary {
        print_summary(table, params);
    }
    if !render.quiet {
        eprintln!("\nOutput: {}", output.display());
    }

    Ok(())
}
