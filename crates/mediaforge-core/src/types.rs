// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core value types shared by the document library and the HTTP server.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, Result};

/// Raster formats the converters can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Avif,
    Tiff,
}

impl ImageFormat {
    /// Parse a user-facing format name (`jpg` and `jpeg` are synonyms).
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            "tif" | "tiff" => Ok(Self::Tiff),
            other => Err(MediaError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Canonical MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
        }
    }
}

/// An RGBA colour, parsed from CSS hex notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse_hex(input: &str) -> Result<Self> {
        let hex = input.trim().trim_start_matches('#');
        let invalid = || MediaError::invalid(format!("Invalid color: {input}"));
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let digit = |i: usize| {
                    u8::from_str_radix(&hex[i..=i], 16)
                        .map(|v| v * 17)
                        .map_err(|_| invalid())
                };
                Ok(Self::rgb(digit(0)?, digit(1)?, digit(2)?))
            }
            6 => Ok(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Ok(Self {
                r: pair(0)?,
                g: pair(2)?,
                b: pair(4)?,
                a: pair(6)?,
            }),
            _ => Err(invalid()),
        }
    }

    /// Parse an optional field, falling back to `default` when absent or empty.
    pub fn parse_or(input: Option<&str>, default: Color) -> Result<Self> {
        match input.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Self::parse_hex(s),
            None => Ok(default),
        }
    }

    /// Lower-case `#rrggbb` (alpha is dropped).
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A parsed page selection such as `"1-3,5,7-10"`.
///
/// Pages are 1-indexed. Ranges are inclusive. Pages outside the document are
/// dropped silently; order and duplicates are kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: Vec<u32>,
}

impl PageSelection {
    pub fn parse(spec: &str, page_count: u32) -> Self {
        let in_range = |p: u32| p >= 1 && p <= page_count;
        let mut pages = Vec::new();

        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let (Ok(start), Ok(end)) =
                        (start.trim().parse::<u32>(), end.trim().parse::<u32>())
                    else {
                        continue;
                    };
                    // Only the part of the range inside the document is walked.
                    pages.extend(start.max(1)..=end.min(page_count));
                }
                None => {
                    if let Ok(page) = part.parse::<u32>()
                        && in_range(page)
                    {
                        pages.push(page);
                    }
                }
            }
        }

        Self { pages }
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }
}

/// Where page numbers are stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageNumberPosition {
    #[default]
    BottomCenter,
    BottomRight,
    TopRight,
}

impl PageNumberPosition {
    /// Unknown or missing values fall back to bottom-center.
    pub fn parse(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            Some("bottom-right") => Self::BottomRight,
            Some("top-right") => Self::TopRight,
            _ => Self::BottomCenter,
        }
    }

    /// Baseline origin of the label on a `width` x `height` page (points).
    pub fn origin(&self, width: f32, height: f32, font_size: f32, label: &str) -> (f32, f32) {
        match self {
            Self::BottomCenter => (width / 2.0 - (font_size * label.len() as f32) / 4.0, 20.0),
            Self::BottomRight => (width - 50.0, 20.0),
            Self::TopRight => (width - 50.0, height - 30.0),
        }
    }
}

/// Paper sizes used for generated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
}

impl PaperSize {
    /// Portrait dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
        }
    }

    /// Dimensions in millimetres for the given orientation.
    pub fn oriented_mm(&self, orientation: Orientation) -> (u32, u32) {
        let (w, h) = self.dimensions_mm();
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// Pixel dimensions at the given resolution, portrait.
    pub fn pixels_at(&self, dpi: f32) -> (u32, u32) {
        let (w, h) = self.dimensions_mm();
        (
            (w as f32 * dpi / 25.4).round() as u32,
            (h as f32 * dpi / 25.4).round() as u32,
        )
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// The operations offered by the PDF tools route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PdfOperation {
    Merge,
    Split,
    Rotate,
    AddPageNumbers,
    Compress,
    ExtractText,
}

impl PdfOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "merge" => Some(Self::Merge),
            "split" => Some(Self::Split),
            "rotate" => Some(Self::Rotate),
            "add-page-numbers" => Some(Self::AddPageNumbers),
            "compress" => Some(Self::Compress),
            "extract-text" => Some(Self::ExtractText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Rotate => "rotate",
            Self::AddPageNumbers => "add-page-numbers",
            Self::Compress => "compress",
            Self::ExtractText => "extract-text",
        }
    }
}

/// Lifecycle of the HTTP listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Stopped,
    Starting,
    Running,
}
