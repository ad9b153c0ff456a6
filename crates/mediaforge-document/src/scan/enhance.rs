// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement: fit a photographed page to A4 at 300 DPI, stretch its
// contrast, sharpen it, optionally binarize it, and export JPEG or PDF.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use mediaforge_core::{ImageFormat, PaperSize, Result};
use tracing::{debug, info, instrument};

use crate::image::processor::{self, ImageProcessor};
use crate::pdf::writer::PdfWriter;

/// Output resolution for scans.
pub const SCAN_DPI: f32 = 300.0;
pub const SCAN_JPEG_QUALITY: u8 = 95;

/// Colour handling for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Keep colour; contrast is stretched per channel.
    #[default]
    Color,
    /// Pure black and white via Otsu thresholding.
    Bw,
}

impl ScanMode {
    /// Unknown or missing values mean colour.
    pub fn parse(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            Some("bw") | Some("black-white") | Some("mono") => Self::Bw,
            _ => Self::Color,
        }
    }
}

/// Enhances photographed or scanned document pages.
pub struct ScanEnhancer {
    image: DynamicImage,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = processor::decode(data)?;
        info!(width = image.width(), height = image.height(), "Scan image loaded");
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Pipeline -------------------------------------------------------------

    /// Run the whole pipeline: fit inside A4 at 300 DPI without enlarging,
    /// normalize, sharpen, then binarize when `mode` is [`ScanMode::Bw`].
    #[instrument(skip(self))]
    pub fn enhance(self, mode: ScanMode) -> Self {
        let (max_w, max_h) = PaperSize::A4.pixels_at(SCAN_DPI);
        let processed = ImageProcessor::from_dynamic(self.image)
            .resize_no_enlarge(max_w, max_h)
            .normalize()
            .sharpen();
        debug!(width = processed.width(), height = processed.height(), "Scan normalized");

        let enhanced = Self {
            image: DynamicImage::ImageRgb8(processed.into_dynamic().to_rgb8()),
        };
        match mode {
            ScanMode::Color => enhanced,
            ScanMode::Bw => enhanced.binarize_otsu(),
        }
    }

    /// Global binarization at the Otsu threshold of the luminance histogram.
    #[instrument(skip(self))]
    pub fn binarize_otsu(self) -> Self {
        let gray = self.image.to_luma8();
        let level = otsu_level(&gray);
        debug!(level, "Otsu threshold computed");

        let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y).0[0] > level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        Self {
            image: DynamicImage::ImageLuma8(binary),
        }
    }

    // -- Export ---------------------------------------------------------------

    /// JPEG at quality 95.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        ImageProcessor::from_dynamic(self.image.clone()).encode(ImageFormat::Jpeg, SCAN_JPEG_QUALITY)
    }

    /// A single A4 page holding the scan.
    #[instrument(skip(self))]
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        let pdf = PdfWriter::new("Mediaforge Scan").images_to_pdf(std::slice::from_ref(&self.image))?;
        info!(pdf_bytes = pdf.len(), "Scan converted to PDF");
        Ok(pdf)
    }
}
