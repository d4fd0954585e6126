//! Typed tabular data and its mapping onto apparatus rows.
//!
//! A `DataTable` is the column-typed intermediate form shared by the CSV codec
//! and spreadsheet import. `ApparatusTable` converts to and from it using the
//! fixed interchange layout: Book, Chapter, Verse, Phrase, Occurrence, then one
//! column per translation siglum.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use thiserror::Error;

use crate::csv::FormatError;
use crate::models::{ApparatusRow, ApparatusTable, FIXED_COLUMNS, FIXED_COLUMN_NAMES};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Spreadsheet has no worksheets")]
    NoWorksheet,
    #[error("Missing column {expected:?} at position {position}")]
    MissingColumn { position: usize, expected: &'static str },
    #[error("Row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// Declared type of a column, used to coerce parsed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}

/// Column types of the apparatus interchange layout; the last entry covers every
/// translation column.
pub const APPARATUS_COLUMN_TYPES: [ColumnType; 6] = [
    ColumnType::Text,
    ColumnType::Integer,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Integer,
    ColumnType::Text,
];

/// Type of column `index` from a positional type list; the last type given is
/// reused for any remaining columns.
pub fn column_type_at(types: &[ColumnType], index: usize) -> ColumnType {
    types
        .get(index)
        .or_else(|| types.last())
        .copied()
        .unwrap_or(ColumnType::Text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

/// A single cell. Text columns always hold `Text`; blank integer cells are `Null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    /// Coerce a raw field to `kind`. Returns `None` when an integer field is not numeric.
    pub fn coerce(raw: &str, kind: ColumnType) -> Option<Value> {
        match kind {
            ColumnType::Text => Some(Value::Text(raw.to_string())),
            ColumnType::Integer => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Some(Value::Null)
                } else {
                    trimmed.parse::<i64>().ok().map(Value::Integer)
                }
            }
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    /// 1-based source line (or sheet row) each entry of `rows` starts on. Empty
    /// for tables built in memory.
    pub source_rows: Vec<usize>,
}

impl DataTable {
    /// Empty table whose column types come from a positional type list.
    pub fn with_columns<S: AsRef<str>>(names: &[S], types: &[ColumnType]) -> Self {
        DataTable {
            columns: names
                .iter()
                .enumerate()
                .map(|(i, name)| Column {
                    name: name.as_ref().to_string(),
                    kind: column_type_at(types, i),
                })
                .collect(),
            rows: Vec::new(),
            source_rows: Vec::new(),
        }
    }

    /// Source row of `rows[index]`, assuming one line per record when unknown.
    pub fn source_row(&self, index: usize) -> usize {
        self.source_rows.get(index).copied().unwrap_or(index + 2)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl ApparatusTable {
    /// Convert to the interchange table layout.
    pub fn to_data_table(&self) -> DataTable {
        let mut names: Vec<&str> = FIXED_COLUMN_NAMES.to_vec();
        names.extend(self.translations.iter().map(String::as_str));
        let mut table = DataTable::with_columns(&names, &APPARATUS_COLUMN_TYPES);

        for row in &self.rows {
            let mut values = vec![
                Value::Text(row.book.clone()),
                Value::Integer(row.chapter_number as i64),
                Value::Text(row.verse.clone()),
                Value::Text(row.phrase.clone()),
                Value::Integer(row.occurrence as i64),
            ];
            for i in 0..self.translations.len() {
                let cell = row.variants.get(i).cloned().flatten().unwrap_or_default();
                values.push(Value::Text(cell));
            }
            table.rows.push(values);
        }

        table
    }

    /// Build an apparatus from a table in the interchange layout.
    ///
    /// Row numbers in errors are 1-based source rows (the header is row 1).
    /// Translation headers are kept as written. An empty reading cell becomes
    /// `None`, so `Some("")` does not survive a round trip.
    pub fn from_data_table(table: &DataTable) -> Result<Self, TableError> {
        for (position, &expected) in FIXED_COLUMN_NAMES.iter().enumerate() {
            let found = table.columns.get(position).map(|c| c.name.trim());
            if !found.is_some_and(|name| name.eq_ignore_ascii_case(expected)) {
                return Err(TableError::MissingColumn { position, expected });
            }
        }

        let translations: Vec<String> = table.columns[FIXED_COLUMNS..]
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let mut apparatus = ApparatusTable::new(translations);

        for (i, values) in table.rows.iter().enumerate() {
            let row_number = table.source_row(i);
            let cell = |idx: usize| values.get(idx).cloned().unwrap_or(Value::Null);
            let number = |idx: usize, name: &str| -> Result<u32, TableError> {
                match cell(idx) {
                    Value::Null => Ok(0),
                    value => value
                        .as_integer()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| TableError::InvalidRow {
                            row: row_number,
                            message: format!("{} is not a non-negative integer", name),
                        }),
                }
            };

            let variants = (FIXED_COLUMNS..table.columns.len())
                .map(|idx| {
                    let text = cell(idx).as_text();
                    if text.is_empty() {
                        None
                    } else {
                        Some(text)
                    }
                })
                .collect();

            apparatus.rows.push(ApparatusRow {
                book: cell(0).as_text(),
                chapter_number: number(1, "Chapter")?,
                verse: cell(2).as_text(),
                phrase: cell(3).as_text(),
                occurrence: number(4, "Occurrence")?,
                variants,
            });
        }

        Ok(apparatus)
    }
}

/// Load the first worksheet of a spreadsheet (xlsx, xls, ods) as a typed table.
///
/// The first row is the header; column types are assigned positionally from `types`.
pub fn load_table_from_spreadsheet(path: &Path, types: &[ColumnType]) -> Result<DataTable, TableError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(TableError::NoWorksheet)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataTable::default());
    };
    let names: Vec<String> = header.iter().map(cell_text).collect();
    let mut table = DataTable::with_columns(&names, types);

    for (i, row) in rows.enumerate() {
        let row_number = i + 2;
        let mut values = Vec::with_capacity(table.columns.len());
        for (idx, column) in table.columns.iter().enumerate() {
            let raw = row.get(idx).map(cell_text).unwrap_or_default();
            let value = Value::coerce(&raw, column.kind).ok_or_else(|| TableError::InvalidRow {
                row: row_number,
                message: format!("column {:?} expects an integer, found {:?}", column.name, raw),
            })?;
            values.push(value);
        }
        table.rows.push(values);
        table.source_rows.push(row_number);
    }

    Ok(table)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Load an apparatus from a spreadsheet in the interchange layout.
pub fn load_apparatus_from_spreadsheet(path: &Path) -> Result<ApparatusTable, TableError> {
    let table = load_table_from_spreadsheet(path, &APPARATUS_COLUMN_TYPES)?;
    ApparatusTable::from_data_table(&table)
}
