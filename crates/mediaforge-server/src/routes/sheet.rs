// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CSV and workbook conversion route.

use mediaforge_core::{MediaError, Result};
use mediaforge_document::PdfWriter;
use mediaforge_document::sheet::{csv_to_json, first_sheet, sheet_rows, sheet_to_csv, sheet_to_json};
use tracing::{info, instrument};

use super::{download_name, required_file};
use crate::http::{Request, Response};
use crate::state::AppState;

const SHEET_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "xlsb", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetMode {
    CsvJson,
    ExcelCsv,
    ExcelJson,
    ExcelPdf,
}

impl SheetMode {
    fn parse(mode: Option<&str>) -> Result<Self> {
        match mode.map(str::to_ascii_lowercase).as_deref() {
            Some("csv-json") => Ok(Self::CsvJson),
            Some("excel-csv") => Ok(Self::ExcelCsv),
            Some("excel-json") => Ok(Self::ExcelJson),
            Some("excel-pdf") => Ok(Self::ExcelPdf),
            _ => Err(MediaError::invalid("Invalid mode")),
        }
    }
}

/// `mode` picks the conversion; workbook modes read the first worksheet.
#[instrument(skip_all)]
pub fn spreadsheet(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let mode = SheetMode::parse(form.text("mode"))?;
    let upload = file.filename.as_deref();

    let response = match mode {
        SheetMode::CsvJson => {
            let rows = csv_to_json(&file.data)?;
            Response::attachment(
                "application/json",
                &download_name(upload, SHEET_EXTENSIONS, "json", "data"),
                serde_json::to_vec_pretty(&rows)?,
            )
        }
        SheetMode::ExcelCsv => Response::attachment(
            "text/csv",
            &download_name(upload, SHEET_EXTENSIONS, "csv", "data"),
            sheet_to_csv(&first_sheet(&file.data)?)?,
        ),
        SheetMode::ExcelJson => {
            let rows = sheet_to_json(&first_sheet(&file.data)?);
            Response::attachment(
                "application/json",
                &download_name(upload, SHEET_EXTENSIONS, "json", "data"),
                serde_json::to_vec_pretty(&rows)?,
            )
        }
        SheetMode::ExcelPdf => {
            let rows = sheet_rows(&first_sheet(&file.data)?);
            Response::attachment(
                "application/pdf",
                &download_name(upload, SHEET_EXTENSIONS, "pdf", "excel-export"),
                PdfWriter::new("Excel Export").table_to_pdf(&rows)?,
            )
        }
    };
    info!(?mode, input = file.data.len(), output = response.body.len(), "spreadsheet converted");
    Ok(response)
}
