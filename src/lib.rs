//! Scripture Critical Apparatus Library
//!
//! Compares scripture text across translations and produces a critical
//! apparatus: a passage-ordered listing of textual variants at word/phrase
//! granularity, with occurrence disambiguation and case/diacritic/punctuation
//! insensitive matching.
//!
//! # Example
//!
//! ```no_run
//! use scripture_apparatus::prelude::*;
//! use std::path::PathBuf;
//!
//! let provider = Provider::PlainText { root: PathBuf::from("bibles") };
//! let request = ApparatusRequest {
//!     base: "KJV".to_string(),
//!     comparisons: vec!["WEB".to_string(), "ASV".to_string()],
//!     passage: PassageReference::parse("1 John 1"),
//! };
//! let params = RenderParams {
//!     interlinear_mode: InterlinearMode::IGNORES_CASE | InterlinearMode::IGNORES_PUNCTUATION,
//!     ..Default::default()
//! };
//!
//! let table = generate_apparatus(
//!     &provider,
//!     &provider,
//!     &request,
//!     Canon::protestant(),
//!     &params,
//!     &AlignParams::default(),
//!     false,
//! )
//! .unwrap();
//!
//! let html = render_apparatus(&table, &params).unwrap();
//! println!("{}", html);
//! ```
//!
//! # Round-tripping a table
//!
//! ```no_run
//! use scripture_apparatus::prelude::*;
//! use std::path::Path;
//!
//! let mut table = read_csv_file(Path::new("apparatus.csv")).unwrap();
//! sort_rows(Canon::with_deuterocanon(), &mut table.rows);
//! write_csv_file(&table, Path::new("sorted.csv")).unwrap();
//! ```

pub mod align;
pub mod canon;
pub mod collate;
pub mod compare;
pub mod config;
pub mod csv;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod reference;
pub mod render;
pub mod table;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::align::{align_words, tokenize, variant_spans, AlignOp, VariantSpan, WordAlignment};
    pub use crate::canon::{Canon, CanonBook, CanonError, PSALM_151};
    pub use crate::collate::{collate_chapter, generate_apparatus, ApparatusRequest};
    pub use crate::compare::{compare_rows, compare_verses, phrases_equal, sort_rows, verse_number};
    pub use crate::config::{load_settings, ApparatusSettings, ConfigError};
    pub use crate::csv::{
        escape_field, parse, parse_apparatus, read_csv_file, serialize, serialize_apparatus,
        write_csv, write_csv_file, FormatError,
    };
    pub use crate::models::{
        AlignParams, ApparatusRow, ApparatusTable, Chapter, InterlinearMode, RenderFormat,
        RenderParams, Verse, FIXED_COLUMNS, FIXED_COLUMN_NAMES, OCCURRENCE_PLACEHOLDER,
    };
    pub use crate::normalize::{is_punctuation, normalize, strip_diacritics};
    pub use crate::provider::{
        import_into_database, initialize_database, insert_chapter, Provider, ProviderError,
    };
    pub use crate::reference::{ChapterReference, PassageReference};
    pub use crate::render::{
        escape_html, group_variants, print_summary, render_apparatus,
        render_apparatus_with_cancel, write_apparatus, write_apparatus_file, write_json,
        write_json_file, RenderError,
    };
    pub use crate::table::{
        load_apparatus_from_spreadsheet, load_table_from_spreadsheet, Column, ColumnType,
        DataTable, TableError, Value, APPARATUS_COLUMN_TYPES,
    };
}

// Re-export commonly used types at the crate root
pub use models::{ApparatusRow, ApparatusTable, InterlinearMode, RenderFormat, RenderParams};
pub use reference::{ChapterReference, PassageReference};
