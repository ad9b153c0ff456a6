// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collage layouts.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use mediaforge_core::{Color, MediaError, Result};
use tracing::{debug, instrument};

pub const DEFAULT_SPACING: u32 = 10;

/// Fixed canvas layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollageLayout {
    /// Two side-by-side slots, 800x400.
    Grid2,
    /// Three side-by-side slots, 900x300.
    Grid3,
    /// 2x2 grid, 800x800.
    #[default]
    Grid4,
    /// 2x2 grid, 1080x1080.
    Instagram,
    /// A wide main slot (60%) and two narrow side slots, 820x312.
    Facebook,
}

/// A placed slot: x, y, width, height.
type Slot = (u32, u32, u32, u32);

impl CollageLayout {
    /// Unknown names fall back to `grid-4`.
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some("grid-2") => Self::Grid2,
            Some("grid-3") => Self::Grid3,
            Some("instagram") => Self::Instagram,
            Some("facebook") => Self::Facebook,
            _ => Self::Grid4,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        match self {
            Self::Grid2 => (800, 400),
            Self::Grid3 => (900, 300),
            Self::Grid4 => (800, 800),
            Self::Instagram => (1080, 1080),
            Self::Facebook => (820, 312),
        }
    }

    pub fn slot_count(&self) -> usize {
        match self {
            Self::Grid2 => 2,
            Self::Grid3 | Self::Facebook => 3,
            Self::Grid4 | Self::Instagram => 4,
        }
    }

    fn slots(&self, spacing: u32) -> Vec<Slot> {
        let (width, height) = self.canvas_size();
        let columns = |count: u32| {
            let slot_w = width.saturating_sub(spacing * (count - 1)) / count;
            (0..count)
                .map(|i| (i * (slot_w + spacing), 0, slot_w, height))
                .collect::<Vec<_>>()
        };

        match self {
            Self::Grid2 => columns(2),
            Self::Grid3 => columns(3),
            Self::Grid4 | Self::Instagram => {
                let slot_w = width.saturating_sub(spacing) / 2;
                let slot_h = height.saturating_sub(spacing) / 2;
                (0..4)
                    .map(|i| {
                        let (col, row) = (i % 2, i / 2);
                        (col * (slot_w + spacing), row * (slot_h + spacing), slot_w, slot_h)
                    })
                    .collect()
            }
            Self::Facebook => {
                let main_w = width * 6 / 10;
                let side_w = width.saturating_sub(main_w + 2 * spacing) / 2;
                vec![
                    (0, 0, main_w, height),
                    (main_w + spacing, 0, side_w, height),
                    (main_w + side_w + 2 * spacing, 0, side_w, height),
                ]
            }
        }
    }
}

/// Place `images` into the layout's slots in order. Each image is scaled to
/// cover its slot and centre-cropped; images beyond the slot count are ignored.
#[instrument(skip(images), fields(images = images.len()))]
pub fn make_collage(
    images: &[DynamicImage],
    layout: CollageLayout,
    spacing: u32,
    background: Color,
) -> Result<RgbaImage> {
    if images.is_empty() {
        return Err(MediaError::invalid("No files provided"));
    }
    let (width, height) = layout.canvas_size();
    let spacing = spacing.min(width.min(height) / 4);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(background.to_array()));

    for (image, (x, y, w, h)) in images.iter().zip(layout.slots(spacing)) {
        if w == 0 || h == 0 {
            continue;
        }
        let tile = image.resize_to_fill(w, h, FilterType::Lanczos3).to_rgba8();
        imageops::overlay(&mut canvas, &tile, x as i64, y as i64);
    }

    debug!(?layout, width, height, "Collage composed");
    Ok(canvas)
}
