// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document scanning and OCR routes.

use image::DynamicImage;
use mediaforge_core::{MediaError, Result};
use mediaforge_document::image::processor::decode;
use mediaforge_document::scan::check_language;
use mediaforge_document::{ScanEnhancer, ScanMode};
use tracing::{info, instrument};

use super::required_file;
use crate::http::{Request, Response};
use crate::state::AppState;

#[instrument(skip_all)]
pub fn scan_document(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let mode = ScanMode::parse(form.text("mode"));
    let as_pdf = match form.text("output").unwrap_or("jpg") {
        "jpg" | "jpeg" | "image" => false,
        "pdf" => true,
        other => return Err(MediaError::invalid(format!("Invalid output: {other}"))),
    };

    let scan = ScanEnhancer::from_bytes(&file.data)?.enhance(mode);
    info!(?mode, as_pdf, "document scanned");
    if as_pdf {
        Ok(Response::attachment(
            "application/pdf",
            "scanned-document.pdf",
            scan.to_pdf()?,
        ))
    } else {
        Ok(Response::attachment(
            "image/jpeg",
            "scanned-document.jpg",
            scan.to_jpeg()?,
        ))
    }
}

#[instrument(skip_all)]
pub fn image_to_text(state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let language = check_language(form.text("language"))?;
    let image = decode(&file.data)?;
    recognize(state, &image, language)
}

#[cfg(feature = "ocr")]
fn recognize(state: &AppState, image: &DynamicImage, language: &str) -> Result<Response> {
    let engine = state
        .ocr()
        .ok_or_else(|| MediaError::Ocr("OCR models are not loaded".into()))?;
    let result = engine.recognize(image, language)?;
    info!(chars = result.text.len(), confidence = result.confidence, "text recognised");
    Ok(Response::json(200, &result))
}

#[cfg(not(feature = "ocr"))]
fn recognize(_state: &AppState, _image: &DynamicImage, _language: &str) -> Result<Response> {
    Err(MediaError::FeatureUnavailable("ocr"))
}
