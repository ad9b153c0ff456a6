// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-to-image rendering with word wrapping.

use image::{DynamicImage, Rgba, RgbaImage};
use mediaforge_core::{Color, ImageFormat, MediaError, Result};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;
use crate::text::font::{FontSource, check_font_size};

/// Inset of the text block from the left and top edges.
const PADDING: u32 = 20;
const LINE_HEIGHT_FACTOR: f32 = 1.2;
const MAX_CANVAS: u32 = 8192;

/// Parameters for a text image. Field names follow the JSON request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextImageOptions {
    pub text: String,
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
    pub font_color: String,
    pub background_color: String,
    /// Accepted for compatibility; the server renders with its one font.
    pub font_family: Option<String>,
    pub format: String,
}

impl Default for TextImageOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            width: 800,
            height: 600,
            font_size: 24.0,
            font_color: "#000000".into(),
            background_color: "#ffffff".into(),
            font_family: None,
            format: "png".into(),
        }
    }
}

/// Renders text onto raster canvases.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    font: FontSource,
}

impl TextRenderer {
    pub fn new(font: FontSource) -> Self {
        Self { font }
    }

    pub fn font(&self) -> &FontSource {
        &self.font
    }

    /// Render a text image and encode it in the requested format.
    #[instrument(skip(self, options), fields(text_len = options.text.len(), width = options.width, height = options.height))]
    pub fn render_text_image(&self, options: &TextImageOptions) -> Result<Vec<u8>> {
        if options.text.trim().is_empty() {
            return Err(MediaError::invalid("No text provided"));
        }
        if options.width == 0
            || options.height == 0
            || options.width > MAX_CANVAS
            || options.height > MAX_CANVAS
        {
            return Err(MediaError::invalid(format!(
                "Width and height must be between 1 and {MAX_CANVAS}"
            )));
        }
        check_font_size(options.font_size)?;
        let format = ImageFormat::parse(&options.format)?;
        let foreground = Color::parse_hex(&options.font_color)?;
        let background = Color::parse_hex(&options.background_color)?;

        let mut canvas = RgbaImage::from_pixel(options.width, options.height, Rgba(background.to_array()));
        let max_width = options.width.saturating_sub(2 * PADDING);
        let lines = self.wrap(&options.text, options.font_size, max_width);
        let line_height = options.font_size * LINE_HEIGHT_FACTOR;

        for (index, line) in lines.iter().enumerate() {
            let y = PADDING as f32 + index as f32 * line_height;
            if y >= options.height as f32 {
                break;
            }
            self.font
                .draw(&mut canvas, line, PADDING as i32, y.round() as i32, options.font_size, foreground);
        }

        info!(lines = lines.len(), ?format, "Text image rendered");
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(canvas)).encode(format, 90)
    }

    /// Greedy word wrap: a word moves to the next line when the current line
    /// plus the word would exceed `max_width`. A word wider than the line gets
    /// a line of its own. Newlines force a break.
    pub fn wrap(&self, text: &str, size: f32, max_width: u32) -> Vec<String> {
        let mut lines = Vec::new();

        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if !current.is_empty() && self.font.measure(&candidate, size).0 > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            lines.push(current);
        }

        debug!(lines = lines.len(), max_width, "Text wrapped");
        lines
    }
}
