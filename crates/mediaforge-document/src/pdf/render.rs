// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page rasterisation through the Pdfium library (`render` feature).
//
// Pdfium is loaded dynamically: either from a configured directory or from
// the system library path.

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use mediaforge_core::{MediaError, Result};
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument};

use crate::pdf::reader::PdfReader;

/// Pages are rendered at twice their size in points.
pub const RENDER_SCALE: f32 = 2.0;

/// Check a 1-based `page` against the document before handing it to Pdfium.
pub fn check_page(pdf: &[u8], page: u32) -> Result<u32> {
    let reader = PdfReader::from_bytes(pdf)?;
    reader.check_page(page)?;
    Ok(reader.page_count())
}

fn bind(library_dir: Option<&Path>) -> Result<Pdfium> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|err| MediaError::Render(format!("failed to load Pdfium: {err}")))?;
    Ok(Pdfium::new(bindings))
}

/// Render 1-based `page` of `pdf` at [`RENDER_SCALE`].
#[instrument(skip(pdf), fields(pdf_len = pdf.len()))]
pub fn render_page(pdf: &[u8], page: u32, library_dir: Option<&Path>) -> Result<DynamicImage> {
    let page_count = check_page(pdf, page)?;
    let pdfium = bind(library_dir)?;

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|err| MediaError::Render(format!("Pdfium could not open the document: {err}")))?;
    let index = (page - 1)
        .try_into()
        .map_err(|_| MediaError::PageOutOfRange { page, page_count })?;
    let pdf_page = document
        .pages()
        .get(index)
        .map_err(|err| MediaError::Render(format!("page {page} unavailable: {err}")))?;

    let config = PdfRenderConfig::new().scale_page_by_factor(RENDER_SCALE);
    let bitmap = pdf_page
        .render_with_config(&config)
        .map_err(|err| MediaError::Render(format!("page {page} failed to render: {err}")))?;

    let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
    let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
        .ok_or_else(|| MediaError::Render("bitmap size does not match its pixel data".into()))?;
    debug!(width, height, "Page rasterised");
    info!(page, page_count, "PDF page rendered");
    Ok(DynamicImage::ImageRgba8(rgba))
}
