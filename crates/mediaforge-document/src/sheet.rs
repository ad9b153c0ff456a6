// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CSV and workbook conversions.
//
// Workbooks (xlsx, xls, xlsb, ods) are read with calamine; only the first
// worksheet is used. Empty rows are skipped everywhere.

use std::io::Cursor;

use calamine::{Data, DataType, Range, Reader, open_workbook_auto_from_rs};
use mediaforge_core::{MediaError, Result};
use serde_json::{Map, Value};
use tracing::{info, instrument};

fn sheet_error(err: impl std::fmt::Display) -> MediaError {
    MediaError::Spreadsheet(err.to_string())
}

/// One object per data row, keyed by the trimmed header row. Short rows get
/// empty strings for their missing columns; extra columns are dropped.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn csv_to_json(data: &[u8]) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers = reader.headers().map_err(sheet_error)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(sheet_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record.get(i).unwrap_or_default();
                (header.to_string(), Value::String(value.to_string()))
            })
            .collect();
        rows.push(row);
    }
    info!(rows = rows.len(), columns = headers.len(), "CSV converted");
    Ok(rows)
}

/// The first worksheet of a workbook.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn first_sheet(data: &[u8]) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data)).map_err(sheet_error)?;
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MediaError::invalid("Workbook has no worksheets"))?
        .map_err(sheet_error)
}

/// Non-empty rows as display strings; empty cells become `""`.
pub fn sheet_rows(sheet: &Range<Data>) -> Vec<Vec<String>> {
    sheet
        .rows()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

/// The sheet as comma-separated text, quoted where a cell needs it.
pub fn sheet_to_csv(sheet: &Range<Data>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in sheet_rows(sheet) {
        writer.write_record(&row).map_err(sheet_error)?;
    }
    writer.into_inner().map_err(sheet_error)
}

/// One object per row after the header row. Numbers and booleans keep
/// their type; empty cells and cells without a header are left out.
pub fn sheet_to_json(sheet: &Range<Data>) -> Vec<Map<String, Value>> {
    let mut rows = sheet
        .rows()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()));
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header.iter().map(cell_text).collect();

    rows.map(|row| {
        row.iter()
            .zip(&headers)
            .filter(|(cell, header)| !cell.is_empty() && !header.is_empty())
            .map(|(cell, header)| (header.clone(), cell_value(cell)))
            .collect()
    })
    .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(n) => Value::from(*n),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        Data::Empty => Value::Null,
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(cells: &[&[Data]]) -> Range<Data> {
        let height = cells.len() as u32;
        let width = cells.iter().map(|row| row.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn text(s: &str) -> Data {
        Data::String(s.into())
    }

    #[test]
    fn csv_rows_are_keyed_by_trimmed_headers() {
        let rows = csv_to_json(b" name , age\nAda, 36\n\nGrace\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Ada");
        assert_eq!(rows[0]["age"], "36");
        assert_eq!(rows[1]["age"], "");
    }

    #[test]
    fn csv_quotes_are_honoured() {
        let rows = csv_to_json(b"city,note\n\"Paris, FR\",\"said \"\"hi\"\"\"\n").unwrap();
        assert_eq!(rows[0]["city"], "Paris, FR");
        assert_eq!(rows[0]["note"], "said \"hi\"");
    }

    #[test]
    fn header_only_csv_is_empty() {
        assert!(csv_to_json(b"a,b\n").unwrap().is_empty());
    }

    #[test]
    fn json_keeps_cell_types() {
        let range = sheet(&[
            &[text("name"), text("score"), text("passed")],
            &[text("Ada"), Data::Float(9.5), Data::Bool(true)],
            &[text("Bob"), Data::Int(7), Data::Empty],
        ]);
        let rows = sheet_to_json(&range);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["score"], 9.5);
        assert_eq!(rows[0]["passed"], true);
        assert_eq!(rows[1]["score"], 7);
        assert!(!rows[1].contains_key("passed"));
    }

    #[test]
    fn csv_export_skips_blank_rows_and_quotes_commas() {
        let range = sheet(&[
            &[text("item"), text("price")],
            &[Data::Empty, Data::Empty],
            &[text("tea, green"), Data::Float(2.5)],
        ]);
        let csv = String::from_utf8(sheet_to_csv(&range).unwrap()).unwrap();
        assert_eq!(csv, "item,price\n\"tea, green\",2.5\n");
        assert_eq!(sheet_rows(&range).len(), 2);
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        let err = first_sheet(b"plain text, not a workbook").unwrap_err();
        assert!(matches!(err, MediaError::Spreadsheet(_)));
    }
}
