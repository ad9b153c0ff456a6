// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Placeholder images with a background pattern and a centred label.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use mediaforge_core::{Color, MediaError, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::text::font::{FontSource, check_font_size};

/// Pattern pitch in pixels.
const PATTERN_STEP: u32 = 20;
const DOT_RADIUS: i32 = 3;
const MAX_DIMENSION: u32 = 8192;
/// The dimension label never exceeds this size.
const MAX_LABEL_SIZE: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    #[default]
    Solid,
    Gradient,
    Dots,
    Grid,
    Diagonal,
}

/// JSON body of the placeholder route.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaceholderOptions {
    pub width: u32,
    pub height: u32,
    pub text: String,
    pub background_color: String,
    pub secondary_color: String,
    pub text_color: String,
    pub pattern: Pattern,
    pub font_size: f32,
    pub show_dimensions: bool,
    pub format: String,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
            text: String::new(),
            background_color: "#CCCCCC".into(),
            secondary_color: "#999999".into(),
            text_color: "#333333".into(),
            pattern: Pattern::Solid,
            font_size: 32.0,
            show_dimensions: true,
            format: "png".into(),
        }
    }
}

#[instrument(skip(font, options), fields(width = options.width, height = options.height, pattern = ?options.pattern))]
pub fn render_placeholder(font: &FontSource, options: &PlaceholderOptions) -> Result<RgbaImage> {
    let (width, height) = (options.width, options.height);
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(MediaError::invalid(format!(
            "Width and height must be between 1 and {MAX_DIMENSION}"
        )));
    }
    check_font_size(options.font_size)?;
    let primary = Color::parse_hex(&options.background_color)?;
    let secondary = Color::parse_hex(&options.secondary_color)?;
    let text_color = Color::parse_hex(&options.text_color)?;

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(primary.to_array()));
    let accent = Rgba(secondary.to_array());

    match options.pattern {
        Pattern::Solid => {}
        Pattern::Gradient => {
            // Linear gradient along the top-left to bottom-right diagonal.
            let (w, h) = (width as f32, height as f32);
            let length = w * w + h * h;
            for (x, y, pixel) in canvas.enumerate_pixels_mut() {
                let t = ((x as f32 * w + y as f32 * h) / length).clamp(0.0, 1.0);
                let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
                *pixel = Rgba([
                    mix(primary.r, secondary.r),
                    mix(primary.g, secondary.g),
                    mix(primary.b, secondary.b),
                    mix(primary.a, secondary.a),
                ]);
            }
        }
        Pattern::Dots => {
            for x in (PATTERN_STEP / 2..width).step_by(PATTERN_STEP as usize) {
                for y in (PATTERN_STEP / 2..height).step_by(PATTERN_STEP as usize) {
                    draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), DOT_RADIUS, accent);
                }
            }
        }
        Pattern::Grid => {
            for x in (0..width).step_by(PATTERN_STEP as usize) {
                draw_line_segment_mut(&mut canvas, (x as f32, 0.0), (x as f32, height as f32), accent);
            }
            for y in (0..height).step_by(PATTERN_STEP as usize) {
                draw_line_segment_mut(&mut canvas, (0.0, y as f32), (width as f32, y as f32), accent);
            }
        }
        Pattern::Diagonal => {
            let h = height as f32;
            let mut start = -(height as i64);
            while start < width as i64 {
                let x = start as f32;
                // Two adjacent segments give the stripe a 2px weight.
                for offset in [0.0, 1.0] {
                    draw_line_segment_mut(&mut canvas, (x + offset, 0.0), (x + offset + h, h), accent);
                }
                start += PATTERN_STEP as i64;
            }
        }
    }

    let centre_x = width as i32 / 2;
    let centre_y = height as i32 / 2;
    let custom = options.text.trim();

    if !custom.is_empty() {
        draw_centred(&mut canvas, font, custom, centre_x, centre_y, options.font_size, text_color);
    }
    if options.show_dimensions {
        let label = format!("{width} × {height}");
        let size = (options.font_size * 0.7).min(MAX_LABEL_SIZE);
        let offset = if custom.is_empty() {
            0
        } else {
            (options.font_size * 0.8).round() as i32
        };
        draw_centred(&mut canvas, font, &label, centre_x, centre_y + offset, size, text_color);
    }

    debug!("Placeholder rendered");
    Ok(canvas)
}

fn draw_centred(canvas: &mut RgbaImage, font: &FontSource, text: &str, cx: i32, cy: i32, size: f32, color: Color) {
    let (w, h) = font.measure(text, size);
    font.draw(canvas, text, cx - w as i32 / 2, cy - h as i32 / 2, size, color);
}
