// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Meme captions: upper-cased, centred, outlined text at the top and bottom
// of an image.

use image::{DynamicImage, RgbaImage};
use mediaforge_core::{Color, Result};
use tracing::instrument;

use crate::text::font::FontSource;

/// Distance of each caption from its edge.
const EDGE_PADDING: i32 = 20;

#[derive(Debug, Clone)]
pub struct MemeOptions {
    pub top_text: String,
    pub bottom_text: String,
    pub font_size: f32,
    pub text_color: Color,
    pub stroke_color: Color,
    pub stroke_width: u32,
}

impl Default for MemeOptions {
    fn default() -> Self {
        Self {
            top_text: String::new(),
            bottom_text: String::new(),
            font_size: 48.0,
            text_color: Color::WHITE,
            stroke_color: Color::BLACK,
            stroke_width: 2,
        }
    }
}

/// Draw the captions onto a copy of `image`.
#[instrument(skip(image, font, options), fields(width = image.width(), height = image.height()))]
pub fn render_meme(image: &DynamicImage, font: &FontSource, options: &MemeOptions) -> Result<RgbaImage> {
    let mut canvas = image.to_rgba8();
    let (width, height) = canvas.dimensions();

    let captions = [
        (options.top_text.trim(), false),
        (options.bottom_text.trim(), true),
    ];
    for (caption, at_bottom) in captions {
        if caption.is_empty() {
            continue;
        }
        let caption = caption.to_uppercase();
        let (text_w, text_h) = font.measure(&caption, options.font_size);
        let x = (width as i32 - text_w as i32) / 2;
        let y = if at_bottom {
            height as i32 - EDGE_PADDING - text_h as i32
        } else {
            EDGE_PADDING
        };
        font.draw_outlined(
            &mut canvas,
            &caption,
            x,
            y,
            options.font_size,
            options.text_color,
            options.stroke_color,
            options.stroke_width,
        );
    }

    Ok(canvas)
}
