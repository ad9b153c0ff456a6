// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font loading and glyph drawing. An outline font is preferred; the built-in
// 5x7 bitmap font keeps text rendering available on hosts without fonts.

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use mediaforge_core::{Color, MediaError, Result};
use tracing::{debug, info, warn};

/// Locations searched when no font path is configured.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Glyph rows of the bitmap font, ASCII 32..=126. Each byte is one row, the
/// low five bits are the columns (bit 4 leftmost).
const BITMAP_GLYPHS: [[u8; 7]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x04, 0x04, 0x04, 0x04, 0x00, 0x04, 0x00], // !
    [0x0A, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00], // "
    [0x0A, 0x1F, 0x0A, 0x0A, 0x1F, 0x0A, 0x00], // #
    [0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04], // $
    [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03], // %
    [0x08, 0x14, 0x14, 0x08, 0x15, 0x12, 0x0D], // &
    [0x04, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00], // '
    [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02], // (
    [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08], // )
    [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00], // *
    [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x04, 0x04, 0x08], // ,
    [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00], // .
    [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10], // /
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x06, 0x08, 0x10, 0x1F], // 2
    [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
    [0x00, 0x00, 0x04, 0x00, 0x04, 0x00, 0x00], // :
    [0x00, 0x00, 0x04, 0x00, 0x04, 0x04, 0x08], // ;
    [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02], // <
    [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00], // =
    [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08], // >
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04], // ?
    [0x0E, 0x11, 0x17, 0x15, 0x17, 0x10, 0x0E], // @
    [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // A
    [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E], // B
    [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E], // C
    [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E], // D
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F], // E
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10], // F
    [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0E], // G
    [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // H
    [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // I
    [0x01, 0x01, 0x01, 0x01, 0x01, 0x11, 0x0E], // J
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11], // K
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F], // L
    [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11], // M
    [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11], // N
    [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // O
    [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10], // P
    [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D], // Q
    [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11], // R
    [0x0E, 0x11, 0x10, 0x0E, 0x01, 0x11, 0x0E], // S
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // T
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // U
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04], // V
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11], // W
    [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11], // X
    [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04], // Y
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F], // Z
    [0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0E], // [
    [0x10, 0x10, 0x08, 0x04, 0x02, 0x01, 0x01], // backslash
    [0x0E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0E], // ]
    [0x04, 0x0A, 0x11, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F], // _
    [0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00], // `
    [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F], // a
    [0x10, 0x10, 0x1E, 0x11, 0x11, 0x11, 0x1E], // b
    [0x00, 0x00, 0x0E, 0x11, 0x10, 0x11, 0x0E], // c
    [0x01, 0x01, 0x0F, 0x11, 0x11, 0x11, 0x0F], // d
    [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E], // e
    [0x06, 0x08, 0x1E, 0x08, 0x08, 0x08, 0x08], // f
    [0x00, 0x00, 0x0F, 0x11, 0x0F, 0x01, 0x0E], // g
    [0x10, 0x10, 0x1E, 0x11, 0x11, 0x11, 0x11], // h
    [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E], // i
    [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C], // j
    [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12], // k
    [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // l
    [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11], // m
    [0x00, 0x00, 0x1E, 0x11, 0x11, 0x11, 0x11], // n
    [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E], // o
    [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10], // p
    [0x00, 0x00, 0x0F, 0x11, 0x0F, 0x01, 0x01], // q
    [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10], // r
    [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E], // s
    [0x08, 0x08, 0x1E, 0x08, 0x08, 0x09, 0x06], // t
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D], // u
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04], // v
    [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A], // w
    [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11], // x
    [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E], // y
    [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F], // z
    [0x02, 0x04, 0x04, 0x08, 0x04, 0x04, 0x02], // {
    [0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // |
    [0x08, 0x04, 0x04, 0x02, 0x04, 0x04, 0x08], // }
    [0x00, 0x00, 0x08, 0x15, 0x02, 0x00, 0x00], // ~
];

/// Bitmap cell in dots: five columns plus one column of spacing, seven rows
/// plus one row of descent.
const BITMAP_ADVANCE: u32 = 6;
const BITMAP_HEIGHT: u32 = 8;

/// Largest text size accepted from a request, in pixels. Glyphs are
/// rasterised at full size, so this bounds per-glyph memory.
pub const MAX_FONT_SIZE: f32 = 500.0;

/// Validate a requested text size.
pub fn check_font_size(size: f32) -> Result<f32> {
    if size.is_finite() && size > 0.0 && size <= MAX_FONT_SIZE {
        Ok(size)
    } else {
        Err(MediaError::invalid(format!(
            "Font size must be greater than 0 and at most {MAX_FONT_SIZE}"
        )))
    }
}

/// Size actually used for drawing; unchecked callers still cannot ask for
/// an unbounded glyph.
fn bounded(size: f32) -> f32 {
    if size.is_finite() {
        size.clamp(1.0, MAX_FONT_SIZE)
    } else {
        1.0
    }
}

/// The font used for all raster text.
#[derive(Clone)]
pub enum FontSource {
    Outline(FontArc),
    Bitmap,
}

impl std::fmt::Debug for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outline(_) => f.write_str("FontSource::Outline"),
            Self::Bitmap => f.write_str("FontSource::Bitmap"),
        }
    }
}

impl FontSource {
    /// Load the configured font, else the first system font found, else the
    /// bitmap font. Never fails.
    pub fn load(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::from_file(path) {
                Ok(font) => return font,
                Err(err) => warn!(path = %path.display(), %err, "Configured font unusable"),
            }
        }

        for candidate in SYSTEM_FONT_PATHS.iter().map(PathBuf::from) {
            if candidate.is_file()
                && let Ok(font) = Self::from_file(&candidate)
            {
                return font;
            }
        }

        warn!("No outline font found, falling back to bitmap font");
        Self::Bitmap
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = Self::from_bytes(bytes)?;
        info!(path = %path.display(), "Font loaded");
        Ok(font)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        FontArc::try_from_vec(bytes)
            .map(Self::Outline)
            .map_err(|err| MediaError::Font(err.to_string()))
    }

    pub fn is_outline(&self) -> bool {
        matches!(self, Self::Outline(_))
    }

    /// Width and height in pixels of `text` set at `size` px.
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        let size = bounded(size);
        match self {
            Self::Outline(font) => text_size(PxScale::from(size), font, text),
            Self::Bitmap => {
                let dot = bitmap_dot(size);
                let glyphs = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
                (
                    glyphs.saturating_mul(BITMAP_ADVANCE * dot),
                    BITMAP_HEIGHT * dot,
                )
            }
        }
    }

    /// Draw `text` with its top-left corner at (`x`, `y`).
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str, x: i32, y: i32, size: f32, color: Color) {
        let pixel = Rgba(color.to_array());
        let size = bounded(size);
        match self {
            Self::Outline(font) => draw_text_mut(canvas, pixel, x, y, PxScale::from(size), font, text),
            Self::Bitmap => draw_bitmap_text(canvas, text, x, y, bitmap_dot(size), pixel),
        }
    }

    /// Draw `text` with an outline of `stroke_width` px in `stroke`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_outlined(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        x: i32,
        y: i32,
        size: f32,
        fill: Color,
        stroke: Color,
        stroke_width: u32,
    ) {
        let radius = stroke_width as i32;
        if radius > 0 {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if (dx, dy) != (0, 0) && dx * dx + dy * dy <= radius * radius {
                        self.draw(canvas, text, x + dx, y + dy, size, stroke);
                    }
                }
            }
        }
        self.draw(canvas, text, x, y, size, fill);
    }
}

/// Size of one bitmap dot for a requested pixel size.
fn bitmap_dot(size: f32) -> u32 {
    ((size / BITMAP_HEIGHT as f32).round() as u32).max(1)
}

fn draw_bitmap_text(canvas: &mut RgbaImage, text: &str, x: i32, y: i32, dot: u32, color: Rgba<u8>) {
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let dot_i = dot as i32;
    let mut cursor = x;

    for ch in text.chars() {
        if cursor >= width {
            break;
        }
        let index = match ch {
            ' '..='~' => ch as usize - 32,
            '×' => 'x' as usize - 32,
            _ => '?' as usize - 32,
        };
        for (row, bits) in BITMAP_GLYPHS[index].iter().enumerate() {
            for col in 0..5 {
                if (bits >> (4 - col)) & 1 == 0 {
                    continue;
                }
                let px = cursor + col * dot_i;
                let py = y + row as i32 * dot_i;
                for sy in py.max(0)..(py + dot_i).min(height) {
                    for sx in px.max(0)..(px + dot_i).min(width) {
                        canvas.put_pixel(sx as u32, sy as u32, color);
                    }
                }
            }
        }
        cursor = cursor.saturating_add((BITMAP_ADVANCE * dot) as i32);
    }
    debug!(chars = text.chars().count(), dot, "Bitmap text drawn");
}
