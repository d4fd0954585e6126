//! CSV codec for apparatus tables.
//!
//! Fields are comma-delimited unless double-quoted; inside quotes commas and
//! newlines are literal and `""` is one literal quote. A record broken across
//! physical lines is re-joined by accumulating continuation lines until the
//! running quote count is even and the record has as many fields as the header.
//!
//! Header names are kept verbatim. A blank reading cell parses as no reading,
//! so an empty-string reading and a missing one serialize the same way.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

use crate::models::ApparatusTable;
use crate::table::{ColumnType, DataTable, TableError, Value, APPARATUS_COLUMN_TYPES};

/// Malformed CSV input. `row` is the 1-based physical line the record starts on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("CSV format error at row {row}: {message}")]
pub struct FormatError {
    pub row: usize,
    pub message: String,
}

impl FormatError {
    fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

/// Parse CSV text into a typed table.
///
/// The header row names the columns; column types are taken positionally from
/// `types`, with the last type reused for any remaining columns. Short rows are
/// padded with blank cells.
pub fn parse(input: &str, types: &[ColumnType]) -> Result<DataTable, FormatError> {
    let lines: Vec<&str> = input
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    let mut pos = 0;

    let Some((_, header)) = next_record(&lines, &mut pos, None)? else {
        return Ok(DataTable::default());
    };
    let mut table = DataTable::with_columns(&header, types);
    let width = table.columns.len();

    while let Some((row, mut fields)) = next_record(&lines, &mut pos, Some(width))? {
        if fields.len() > width {
            return Err(FormatError::new(
                row,
                format!("expected {} fields, found {}", width, fields.len()),
            ));
        }
        fields.resize(width, String::new());

        let mut values = Vec::with_capacity(width);
        for (field, column) in fields.iter().zip(&table.columns) {
            let value = Value::coerce(field, column.kind).ok_or_else(|| {
                FormatError::new(
                    row,
                    format!("column {:?} expects an integer, found {:?}", column.name, field),
                )
            })?;
            values.push(value);
        }
        table.rows.push(values);
        table.source_rows.push(row);
    }

    Ok(table)
}

/// Read the next logical record, joining continuation lines.
///
/// Returns the 1-based starting row and the record's fields, or `None` at end of input.
fn next_record(
    lines: &[&str],
    pos: &mut usize,
    width: Option<usize>,
) -> Result<Option<(usize, Vec<String>)>, FormatError> {
    while *pos < lines.len() && lines[*pos].is_empty() {
        *pos += 1;
    }
    if *pos >= lines.len() {
        return Ok(None);
    }

    let start = *pos + 1;
    let mut record = lines[*pos].to_string();
    let mut quotes = count_quotes(lines[*pos]);
    *pos += 1;

    loop {
        let balanced = quotes % 2 == 0;
        if balanced {
            let fields = split_fields(&record);
            let complete = width.map_or(true, |width| fields.len() >= width);
            let next_is_blank = lines.get(*pos).map_or(true, |line| line.is_empty());
            if complete || next_is_blank {
                return Ok(Some((start, fields)));
            }
        } else if *pos >= lines.len() {
            return Err(FormatError::new(start, "unterminated quoted field"));
        }

        record.push('\n');
        record.push_str(lines[*pos]);
        quotes += count_quotes(lines[*pos]);
        *pos += 1;
    }
}

fn count_quotes(line: &str) -> usize {
    line.bytes().filter(|&b| b == b'"').count()
}

fn split_fields(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' => in_quotes = true,
                _ => field.push(c),
            }
        }
    }
    fields.push(field);

    fields
}

/// Quote a field if it contains a comma, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Serialize a table: header row, then one line per row.
pub fn serialize(table: &DataTable) -> String {
    let mut out = String::new();
    push_record(&mut out, table.columns.iter().map(|c| c.name.clone()));
    for row in &table.rows {
        push_record(&mut out, row.iter().map(Value::as_text));
    }
    out
}

fn push_record<I: Iterator<Item = String>>(out: &mut String, fields: I) {
    let record: Vec<String> = fields.map(|f| escape_field(&f)).collect();
    out.push_str(&record.join(","));
    out.push('\n');
}

/// Parse CSV in the apparatus interchange layout.
pub fn parse_apparatus(input: &str) -> Result<ApparatusTable, TableError> {
    let table = parse(input, &APPARATUS_COLUMN_TYPES)?;
    ApparatusTable::from_data_table(&table)
}

pub fn serialize_apparatus(apparatus: &ApparatusTable) -> String {
    serialize(&apparatus.to_data_table())
}

/// Write an apparatus as CSV.
pub fn write_csv<W: Write>(apparatus: &ApparatusTable, writer: &mut W) -> io::Result<()> {
    writer.write_all(serialize_apparatus(apparatus).as_bytes())
}

/// Write an apparatus as CSV to a file.
pub fn write_csv_file(apparatus: &ApparatusTable, path: &Path) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    write_csv(apparatus, &mut file)
}

/// Read an apparatus CSV file.
pub fn read_csv_file(path: &Path) -> Result<ApparatusTable, TableError> {
    let text = fs::read_to_string(path)?;
    parse_apparatus(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApparatusRow;

    const TYPES: [ColumnType; 2] = [ColumnType::Text, ColumnType::Integer];

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_parse_simple() {
        let table = parse("Name,Count,More\nalpha,1,2\nbeta,,3\n", &TYPES).unwrap();
        assert_eq!(table.column_names(), vec!["Name", "Count", "More"]);
        assert_eq!(table.columns[2].kind, ColumnType::Integer);
        assert_eq!(
            table.rows,
            vec![
                vec![text("alpha"), Value::Integer(1), Value::Integer(2)],
                vec![text("beta"), Value::Null, Value::Integer(3)],
            ]
        );
    }

    #[test]
    fn test_quoted_fields() {
        let input = "A,B\n\"a, b\",\"say \"\"hi\"\"\"\n";
        let table = parse(input, &[ColumnType::Text]).unwrap();
        assert_eq!(table.rows, vec![vec![text("a, b"), text("say \"hi\"")]]);
    }

    #[test]
    fn test_embedded_newline_is_one_row() {
        let input = "Book,Phrase,Note\nJude,\"first line\nsecond line\",x\nJude,plain,y\n";
        let table = parse(input, &[ColumnType::Text]).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], text("first line\nsecond line"));
        assert_eq!(table.rows[0][2], text("x"));
        assert_eq!(table.rows[1][1], text("plain"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let table = parse("A,B\r\n1,2\r\n", &[ColumnType::Integer]).unwrap();
        assert_eq!(table.rows, vec![vec![Value::Integer(1), Value::Integer(2)]]);
    }

    #[test]
    fn test_unbalanced_quote_names_row() {
        let input = "A,B\nok,row\n\"never closed,x\nmore\n";
        let err = parse(input, &[ColumnType::Text]).unwrap_err();
        assert_eq!(err.row, 3);
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_integer_column_rejects_text() {
        let err = parse("A,B\nx,notanumber\n", &TYPES).unwrap_err();
        assert_eq!(err.row, 2);
    }

    #[test]
    fn test_too_many_fields() {
        let err = parse("A,B\n1,2,3\n", &[ColumnType::Text]).unwrap_err();
        assert_eq!(err.row, 2);
    }

    #[test]
    fn test_short_final_row_is_padded() {
        let table = parse("A,B,C\nx\n", &[ColumnType::Text]).unwrap();
        assert_eq!(table.rows, vec![vec![text("x"), text(""), text("")]]);
    }

    #[test]
    fn test_empty_input() {
        let table = parse("", &TYPES).unwrap();
        assert!(table.columns.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_apparatus_round_trip() {
        let apparatus = ApparatusTable {
            translations: vec!["KJV".to_string(), "WEB, 2000".to_string()],
            rows: vec![
                ApparatusRow {
                    book: "1 John".to_string(),
                    chapter_number: 1,
                    verse: "3".to_string(),
                    phrase: "that which \"we\" have seen".to_string(),
                    occurrence: 2,
                    variants: vec![Some("what we,\nsaw".to_string()), None],
                },
                ApparatusRow {
                    book: "Jude".to_string(),
                    chapter_number: 1,
                    verse: "12b".to_string(),
                    phrase: String::new(),
                    occurrence: 0,
                    variants: vec![None, Some("om.".to_string())],
                },
            ],
        };

        let csv = serialize_apparatus(&apparatus);
        assert!(csv.starts_with("Book,Chapter,Verse,Phrase,Occurrence,KJV,\"WEB, 2000\"\n"));
        assert_eq!(parse_apparatus(&csv).unwrap(), apparatus);
    }

    #[test]
    fn test_invalid_row_after_multiline_record_names_source_line() {
        let input = "Book,Chapter,Verse,Phrase,Occurrence,A\n\
                     Jude,1,1,\"servant\nof Jesus\",0,slave\n\
                     Jude,one,2,mercy,0,grace\n";
        let table = parse(input, &APPARATUS_COLUMN_TYPES);
        let err = table.unwrap_err();
        assert_eq!(err.row, 4);

        let input = "Book,Chapter,Verse,Phrase,Occurrence,A\n\
                     Jude,1,1,\"servant\nof Jesus\",0,slave\n\
                     Jude,-1,2,mercy,0,grace\n";
        let table = parse(input, &APPARATUS_COLUMN_TYPES).unwrap();
        assert_eq!(table.source_rows, vec![2, 4]);
        match ApparatusTable::from_data_table(&table) {
            Err(TableError::InvalidRow { row, .. }) => assert_eq!(row, 4),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_header_whitespace_and_blank_readings() {
        let apparatus = ApparatusTable {
            translations: vec![" A".to_string(), "B ".to_string()],
            rows: vec![ApparatusRow {
                book: "Jude".to_string(),
                chapter_number: 1,
                verse: "1".to_string(),
                phrase: "servant".to_string(),
                occurrence: 0,
                variants: vec![Some(String::new()), Some("slave".to_string())],
            }],
        };

        let parsed = parse_apparatus(&serialize_apparatus(&apparatus)).unwrap();
        assert_eq!(parsed.translations, apparatus.translations);
        assert_eq!(parsed.rows[0].variants, vec![None, Some("slave".to_string())]);
    }
}
