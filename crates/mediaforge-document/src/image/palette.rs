// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dominant colour extraction by quantised histogram.

use std::collections::HashMap;

use image::DynamicImage;
use image::imageops::FilterType;
use serde::Serialize;
use tracing::{debug, instrument};

/// Longest side the image is reduced to before counting.
const SAMPLE_SIZE: u32 = 300;
/// Channels are rounded to the nearest multiple of this.
const QUANTUM: f32 = 10.0;
/// Pixels more transparent than this are ignored.
const MIN_ALPHA: u8 = 128;

pub const DEFAULT_COLOR_COUNT: usize = 5;

/// One entry of an extracted palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaletteColor {
    pub hex: String,
    pub rgb: String,
    pub hsl: String,
    pub count: u32,
}

/// Return up to `count` most frequent colours, most frequent first. Ties are
/// broken by colour value so the output is deterministic.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn extract_palette(image: &DynamicImage, count: usize) -> Vec<PaletteColor> {
    let sample = if image.width() > SAMPLE_SIZE || image.height() > SAMPLE_SIZE {
        image.resize(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
    } else {
        image.clone()
    };

    let mut histogram: HashMap<[u8; 3], u32> = HashMap::new();
    for pixel in sample.to_rgba8().pixels() {
        let [r, g, b, a] = pixel.0;
        if a < MIN_ALPHA {
            continue;
        }
        *histogram.entry([quantise(r), quantise(g), quantise(b)]).or_default() += 1;
    }

    let mut ranked: Vec<([u8; 3], u32)> = histogram.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    debug!(distinct = ranked.len(), "Colour histogram built");

    ranked
        .into_iter()
        .take(count)
        .map(|([r, g, b], count)| PaletteColor {
            hex: format!("#{r:02x}{g:02x}{b:02x}"),
            rgb: format!("rgb({r}, {g}, {b})"),
            hsl: rgb_to_hsl(r, g, b),
            count,
        })
        .collect()
}

fn quantise(channel: u8) -> u8 {
    ((channel as f32 / QUANTUM).round() * QUANTUM).min(255.0) as u8
}

/// CSS `hsl(h, s%, l%)` string with whole-number components.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> String {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;

    let (hue, saturation) = if (max - min).abs() < f32::EPSILON {
        (0.0, 0.0)
    } else {
        let delta = max - min;
        let saturation = if lightness > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };
        let hue = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        (hue / 6.0, saturation)
    };

    format!(
        "hsl({}, {}%, {}%)",
        (hue * 360.0).round() as u32,
        (saturation * 100.0).round() as u32,
        (lightness * 100.0).round() as u32
    )
}
