// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF routes.

use image::DynamicImage;
use mediaforge_core::{ImageFormat, MediaError, PageNumberPosition, PageSelection, PdfOperation, Result};
use mediaforge_document::image::processor::decode;
use mediaforge_document::pdf::table::{extract_table, html_to_text};
use mediaforge_document::{PdfReader, PdfWriter};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{encode, leading_int, output_format, required_file, required_files};
use crate::http::{Request, Response};
use crate::state::AppState;

const PAGE_IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const PAGE_IMAGE_QUALITY: u8 = 90;
const DEFAULT_ROTATION: i64 = 90;
const EXCEL_HEADING: &str = "Excel Data";

#[instrument(skip_all)]
pub fn image_to_pdf(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let files = required_files(&form, "files")?;

    let images = files
        .iter()
        .map(|part| decode(&part.data))
        .collect::<Result<Vec<_>>>()?;
    let pdf = PdfWriter::default().images_to_pdf(&images)?;

    info!(pages = images.len(), bytes = pdf.len(), "images combined into PDF");
    Ok(Response::attachment("application/pdf", "converted.pdf", pdf))
}

#[instrument(skip_all)]
pub fn pdf_to_image(state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let (name, format) = page_format(form.text("format"))?;
    let page = requested_page(form.text("page"));

    PdfReader::from_bytes(&file.data)?.check_page(page)?;
    let image = render(state, &file.data, page)?;
    let bytes = encode(image, format, PAGE_IMAGE_QUALITY)?;

    Ok(Response::attachment(
        &format!("image/{name}"),
        &format!("page-{page}.{name}"),
        bytes,
    ))
}

/// Unknown formats fall back to PNG rather than failing the request.
fn page_format(requested: Option<&str>) -> Result<(String, ImageFormat)> {
    output_format(requested, PAGE_IMAGE_FORMATS)
        .or_else(|_| output_format(Some("png"), PAGE_IMAGE_FORMATS))
}

/// Missing, unparsable and zero page numbers mean the first page. Negative
/// numbers map to 0 so they fail the range check.
fn requested_page(value: Option<&str>) -> u32 {
    match value.and_then(leading_int) {
        None | Some(0) => 1,
        Some(n) if n < 0 => 0,
        Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
    }
}

#[cfg(feature = "render")]
fn render(state: &AppState, pdf: &[u8], page: u32) -> Result<DynamicImage> {
    mediaforge_document::pdf::render::render_page(
        pdf,
        page,
        state.config.pdfium_library_dir.as_deref(),
    )
}

#[cfg(not(feature = "render"))]
fn render(_state: &AppState, _pdf: &[u8], _page: u32) -> Result<DynamicImage> {
    Err(MediaError::FeatureUnavailable("render"))
}

#[instrument(skip_all)]
pub fn pdf_tools(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let files = required_files(&form, "files")?;
    let operation = form
        .text("operation")
        .and_then(PdfOperation::parse)
        .ok_or_else(|| MediaError::invalid("Invalid operation"))?;

    // Only merge reads every upload; the other operations work on the first.
    let used = if operation == PdfOperation::Merge { files.len() } else { 1 };
    let documents = files[..used]
        .iter()
        .map(|part| PdfReader::from_bytes(&part.data))
        .collect::<Result<Vec<_>>>()?;
    let first = &documents[0];

    let output = match operation {
        PdfOperation::Merge => PdfReader::merge(&documents)?,
        PdfOperation::Split => {
            let ranges = form.text("pageRanges").unwrap_or_default();
            first.select_pages(&PageSelection::parse(ranges, first.page_count()))?
        }
        PdfOperation::Rotate => {
            let angle = match form.text("rotationAngle").and_then(leading_int) {
                None | Some(0) => DEFAULT_ROTATION,
                Some(angle) => angle,
            };
            let angle = i32::try_from(angle)
                .map_err(|_| MediaError::invalid(format!("Rotation must be a multiple of 90, got {angle}")))?;
            first.rotate_all(angle)?
        }
        PdfOperation::AddPageNumbers => {
            first.add_page_numbers(PageNumberPosition::parse(form.text("pageNumberPosition")))?
        }
        PdfOperation::Compress => first.compress()?,
        PdfOperation::ExtractText => {
            let text = first.extract_text()?;
            return Ok(Response::json(200, &json!({ "text": text })));
        }
    };

    info!(
        operation = operation.as_str(),
        documents = documents.len(),
        bytes = output.len(),
        "PDF processed"
    );
    Ok(Response::attachment(
        "application/pdf",
        &format!("{}.pdf", operation.as_str()),
        output,
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExcelExport {
    html: String,
}

/// The first HTML table becomes a paginated landscape table; without a table
/// the page text is printed under a fixed heading.
#[instrument(skip_all)]
pub fn excel_to_pdf(_state: &AppState, request: &Request) -> Result<Response> {
    let export: ExcelExport = request.json()?;
    if export.html.trim().is_empty() {
        return Err(MediaError::invalid("HTML content is required"));
    }

    let writer = PdfWriter::new("Excel Export");
    let pdf = match extract_table(&export.html) {
        Some(rows) => writer.table_to_pdf(&rows)?,
        None => {
            let text = html_to_text(&export.html);
            let body = if text.is_empty() { "No content" } else { text.as_str() };
            writer.text_to_pdf(EXCEL_HEADING, body)?
        }
    };
    Ok(Response::attachment("application/pdf", "excel-export.pdf", pdf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::tests::FormBuilder;
    use crate::routes::tests::{call, error_message, json_request, multipart_request, sample_png};

    fn sample_pdf(pages: usize) -> Vec<u8> {
        let images = vec![DynamicImage::new_rgb8(4, 4); pages];
        PdfWriter::default().images_to_pdf(&images).unwrap()
    }

    fn page_count(pdf: &[u8]) -> u32 {
        PdfReader::from_bytes(pdf).unwrap().page_count()
    }

    fn tools(form: FormBuilder) -> Response {
        call(&multipart_request("/api/pdf-tools", form))
    }

    #[test]
    fn images_become_one_page_each() {
        let form = FormBuilder::default()
            .file("files", "a.png", &sample_png(10, 10))
            .file("files", "b.png", &sample_png(20, 10));
        let response = call(&multipart_request("/api/image-to-pdf", form));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("application/pdf"));
        assert_eq!(page_count(&response.body), 2);
    }

    #[test]
    fn merge_concatenates_documents() {
        let form = FormBuilder::default()
            .text("operation", "merge")
            .file("files", "a.pdf", &sample_pdf(1))
            .file("files", "b.pdf", &sample_pdf(1));
        let response = tools(form);
        assert_eq!(response.status, 200);
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"merge.pdf\"")
        );
        assert_eq!(page_count(&response.body), 2);
    }

    #[test]
    fn split_keeps_the_selected_range() {
        let form = FormBuilder::default()
            .text("operation", "split")
            .text("pageRanges", "1-2")
            .file("files", "five.pdf", &sample_pdf(5));
        let response = tools(form);
        assert_eq!(response.status, 200);
        assert_eq!(page_count(&response.body), 2);
    }

    #[test]
    fn split_clips_huge_ranges() {
        let form = FormBuilder::default()
            .text("operation", "split")
            .text("pageRanges", "1-4000000000")
            .file("files", "five.pdf", &sample_pdf(5));
        let response = tools(form);
        assert_eq!(response.status, 200);
        assert_eq!(page_count(&response.body), 5);
    }

    #[test]
    fn single_document_operations_ignore_extra_uploads() {
        let form = FormBuilder::default()
            .text("operation", "compress")
            .file("files", "one.pdf", &sample_pdf(1))
            .file("files", "junk.pdf", b"not a pdf");
        assert_eq!(tools(form).status, 200);

        let form = FormBuilder::default()
            .text("operation", "merge")
            .file("files", "one.pdf", &sample_pdf(1))
            .file("files", "junk.pdf", b"not a pdf");
        let response = tools(form);
        assert_eq!(response.status, 500);
        assert_eq!(error_message(&response), "Failed to process PDF");
    }

    #[test]
    fn split_with_nothing_selected_is_rejected() {
        let form = FormBuilder::default()
            .text("operation", "split")
            .text("pageRanges", "9-12")
            .file("files", "five.pdf", &sample_pdf(5));
        assert_eq!(tools(form).status, 400);
    }

    fn rotation_of_first_page(pdf: &[u8]) -> i64 {
        let doc = lopdf::Document::load_mem(pdf).unwrap();
        let page = doc.get_pages()[&1];
        doc.get_dictionary(page)
            .unwrap()
            .get(b"Rotate")
            .unwrap()
            .as_i64()
            .unwrap()
    }

    #[test]
    fn rotate_defaults_to_ninety_degrees() {
        for angle in [None, Some("0"), Some("sideways")] {
            let mut form = FormBuilder::default().text("operation", "rotate");
            if let Some(angle) = angle {
                form = form.text("rotationAngle", angle);
            }
            let response = tools(form.file("files", "one.pdf", &sample_pdf(1)));
            assert_eq!(response.status, 200, "{angle:?}");
            assert_eq!(rotation_of_first_page(&response.body), 90, "{angle:?}");
        }

        let form = FormBuilder::default()
            .text("operation", "rotate")
            .text("rotationAngle", "180")
            .file("files", "one.pdf", &sample_pdf(1));
        assert_eq!(rotation_of_first_page(&tools(form).body), 180);

        let form = FormBuilder::default()
            .text("operation", "rotate")
            .text("rotationAngle", "45")
            .file("files", "one.pdf", &sample_pdf(1));
        assert_eq!(tools(form).status, 400);
    }

    #[test]
    fn extract_text_answers_json() {
        let form = FormBuilder::default()
            .text("operation", "extract-text")
            .file("files", "two.pdf", &sample_pdf(2));
        let response = tools(form);
        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert!(body["text"].as_str().unwrap().contains("--- Page 2 ---"));
    }

    #[test]
    fn unknown_operation_is_rejected_after_the_file_check() {
        let form = FormBuilder::default()
            .text("operation", "shred")
            .file("files", "one.pdf", &sample_pdf(1));
        let response = tools(form);
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "Invalid operation");
    }

    #[test]
    fn page_numbers_and_compress_produce_pdfs() {
        for operation in ["add-page-numbers", "compress"] {
            let form = FormBuilder::default()
                .text("operation", operation)
                .text("pageNumberPosition", "top-right")
                .file("files", "three.pdf", &sample_pdf(3));
            let response = tools(form);
            assert_eq!(response.status, 200, "{operation}");
            assert_eq!(page_count(&response.body), 3);
        }
    }

    #[test]
    fn page_out_of_range_names_the_page_count() {
        let form = FormBuilder::default()
            .text("page", "7")
            .file("file", "three.pdf", &sample_pdf(3));
        let response = call(&multipart_request("/api/pdf-to-image", form));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "Invalid page number. PDF has 3 pages");
    }

    #[test]
    fn unknown_page_formats_fall_back_to_png() {
        let (name, format) = page_format(Some("gif")).unwrap();
        assert_eq!((name.as_str(), format), ("png", ImageFormat::Png));
        assert_eq!(page_format(None).unwrap().0, "png");
        assert_eq!(page_format(Some("WEBP")).unwrap().0, "webp");
    }

    #[test]
    fn page_numbers_read_like_parse_int() {
        assert_eq!(requested_page(None), 1);
        assert_eq!(requested_page(Some("0")), 1);
        assert_eq!(requested_page(Some("abc")), 1);
        assert_eq!(requested_page(Some("3rd")), 3);
        assert_eq!(requested_page(Some("-2")), 0);
    }

    #[test]
    fn excel_table_and_text_fallback() {
        let table = r#"{"html":"<table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td>2</td></tr></table>"}"#;
        let response = call(&json_request("/api/excel-to-pdf", table));
        assert_eq!(response.status, 200);
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"excel-export.pdf\"")
        );
        assert_eq!(page_count(&response.body), 1);

        let text = r#"{"html":"<p>just words</p>"}"#;
        assert_eq!(call(&json_request("/api/excel-to-pdf", text)).status, 200);
    }

    #[test]
    fn excel_requires_html() {
        let response = call(&json_request("/api/excel-to-pdf", r#"{"html":""}"#));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "HTML content is required");

        let response = call(&json_request("/api/excel-to-pdf", "{}"));
        assert_eq!(error_message(&response), "HTML content is required");
    }
}
