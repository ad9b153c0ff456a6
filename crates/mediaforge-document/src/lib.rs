// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mediaforge-document: Conversion library for the Mediaforge converter suite.
//
// Provides image processing (format conversion, geometry, filters, palette
// extraction, background removal, SVG rasterisation), PDF operations (merge,
// select, rotate, number, compress, extract text, build from
// images/tables/text), a scanning pipeline with optional OCR, text rendering
// and compositing (text images, memes, placeholders, collages, icons),
// QR/barcode generation, and CSV and workbook conversion.

pub mod codes;
pub mod compose;
pub mod image;
pub mod pdf;
pub mod scan;
pub mod sheet;
pub mod text;

// Re-export the primary structs so callers can use `mediaforge_document::PdfReader` etc.
pub use codes::barcode::{BarcodeOptions, BarcodeSymbology};
pub use codes::qr::{QrErrorCorrection, QrOptions};
pub use image::background::{BackgroundOptions, BackgroundRemover};
pub use image::palette::PaletteColor;
pub use image::processor::ImageProcessor;
pub use image::svg::SvgOptions;
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfWriter;
pub use scan::enhance::{ScanEnhancer, ScanMode};
pub use text::font::FontSource;
pub use text::render::{TextImageOptions, TextRenderer};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrEngine;
