// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 1D barcodes encoded with `barcoders` and drawn as bars with an optional
// human-readable value underneath.

use barcoders::sym::codabar::Codabar;
use barcoders::sym::code128::Code128;
use barcoders::sym::code39::Code39;
use barcoders::sym::ean13::EAN13;
use barcoders::sym::ean8::EAN8;
use barcoders::sym::tf::TF;
use image::{Rgba, RgbaImage};
use mediaforge_core::{Color, MediaError, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::text::font::{FontSource, check_font_size};

/// Quiet zone around the symbol.
const MARGIN: u32 = 10;
/// Gap between the bars and the printed value.
const TEXT_MARGIN: u32 = 2;
const MAX_BAR_WIDTH: u32 = 10;
const MAX_BAR_HEIGHT: u32 = 1000;

/// Code 128 data must announce its character set; `Ɓ` selects set B.
const CODE128_SET_B: char = 'Ɓ';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BarcodeSymbology {
    #[default]
    Code128,
    Code39,
    Ean13,
    Ean8,
    Itf,
    Codabar,
}

impl BarcodeSymbology {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Code128 => "CODE128",
            Self::Code39 => "CODE39",
            Self::Ean13 => "EAN13",
            Self::Ean8 => "EAN8",
            Self::Itf => "ITF",
            Self::Codabar => "CODABAR",
        }
    }

    /// Module pattern for `text`, one entry per module (1 = bar).
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let invalid = |err: barcoders::error::Error| {
            MediaError::invalid(format!("Invalid {} value: {err}", self.name()))
        };
        match self {
            Self::Code128 => Code128::new(format!("{CODE128_SET_B}{text}"))
                .map(|c| c.encode())
                .map_err(invalid),
            Self::Code39 => Code39::new(text.to_ascii_uppercase())
                .map(|c| c.encode())
                .map_err(invalid),
            Self::Ean13 => EAN13::new(strip_check_digit(text, 12)?)
                .map(|c| c.encode())
                .map_err(invalid),
            Self::Ean8 => EAN8::new(strip_check_digit(text, 7)?)
                .map(|c| c.encode())
                .map_err(invalid),
            Self::Itf => {
                if text.len() % 2 != 0 {
                    return Err(MediaError::invalid("ITF needs an even number of digits"));
                }
                TF::interleaved(text).map(|c| c.encode()).map_err(invalid)
            }
            Self::Codabar => Codabar::new(with_codabar_guards(text))
                .map(|c| c.encode())
                .map_err(invalid),
        }
    }
}

/// EAN payloads are accepted with or without their check digit. A supplied
/// check digit must be correct; it is recomputed by the encoder.
fn strip_check_digit(text: &str, payload_len: usize) -> Result<String> {
    let digits = text.trim();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(MediaError::invalid("EAN values may only contain digits"));
    }
    if digits.len() == payload_len {
        return Ok(digits.to_string());
    }
    if digits.len() != payload_len + 1 {
        return Err(MediaError::invalid(format!(
            "EAN value must have {payload_len} or {} digits",
            payload_len + 1
        )));
    }
    let (payload, check) = digits.split_at(payload_len);
    if ean_check_digit(payload) != check.as_bytes()[0] - b'0' {
        return Err(MediaError::invalid("EAN check digit is wrong"));
    }
    Ok(payload.to_string())
}

/// Weights alternate 3 and 1 starting from the rightmost payload digit.
fn ean_check_digit(payload: &str) -> u8 {
    let sum: u32 = payload
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Codabar symbols start and stop with one of `A`..`D`; add `A` guards when
/// the caller left them out.
fn with_codabar_guards(text: &str) -> String {
    let text = text.trim().to_ascii_uppercase();
    let is_guard = |c: Option<char>| matches!(c, Some('A'..='D'));
    if is_guard(text.chars().next()) && is_guard(text.chars().last()) && text.len() > 1 {
        text
    } else {
        format!("A{text}A")
    }
}

/// JSON body of the barcode route.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BarcodeOptions {
    pub text: String,
    pub format: BarcodeSymbology,
    /// Width of one module in pixels.
    pub width: u32,
    /// Bar height in pixels.
    pub height: u32,
    pub display_value: bool,
    pub font_size: f32,
    pub line_color: String,
    pub background_color: String,
}

impl Default for BarcodeOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            format: BarcodeSymbology::Code128,
            width: 2,
            height: 100,
            display_value: true,
            font_size: 20.0,
            line_color: "#000000".into(),
            background_color: "#ffffff".into(),
        }
    }
}

#[instrument(skip(font, options), fields(format = options.format.name(), text_len = options.text.len()))]
pub fn render_barcode(font: &FontSource, options: &BarcodeOptions) -> Result<RgbaImage> {
    if options.text.trim().is_empty() {
        return Err(MediaError::invalid("No text provided"));
    }
    if options.width == 0 || options.width > MAX_BAR_WIDTH {
        return Err(MediaError::invalid(format!(
            "Bar width must be between 1 and {MAX_BAR_WIDTH}"
        )));
    }
    if options.height == 0 || options.height > MAX_BAR_HEIGHT {
        return Err(MediaError::invalid(format!(
            "Bar height must be between 1 and {MAX_BAR_HEIGHT}"
        )));
    }
    if options.display_value {
        check_font_size(options.font_size)?;
    }
    let line = Color::parse_hex(&options.line_color)?;
    let background = Color::parse_hex(&options.background_color)?;

    let modules = options.format.encode(&options.text)?;
    let bars_w = modules.len() as u32 * options.width;

    let label = options.text.trim();
    let (text_w, text_h) = if options.display_value {
        font.measure(label, options.font_size)
    } else {
        (0, 0)
    };
    let text_block = if options.display_value { TEXT_MARGIN + text_h } else { 0 };

    let width = bars_w.max(text_w) + 2 * MARGIN;
    let height = options.height + text_block + 2 * MARGIN;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(background.to_array()));

    let ink = Rgba(line.to_array());
    let bars_x = (width - bars_w) / 2;
    for (index, _) in modules.iter().enumerate().filter(|(_, m)| **m == 1) {
        let x0 = bars_x + index as u32 * options.width;
        for x in x0..x0 + options.width {
            for y in MARGIN..MARGIN + options.height {
                canvas.put_pixel(x, y, ink);
            }
        }
    }

    if options.display_value {
        let x = (width as i32 - text_w as i32) / 2;
        let y = (MARGIN + options.height + TEXT_MARGIN) as i32;
        font.draw(&mut canvas, label, x, y, options.font_size, line);
    }

    debug!(modules = modules.len(), width, height, "Barcode rendered");
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(format: BarcodeSymbology, text: &str) -> BarcodeOptions {
        BarcodeOptions {
            text: text.into(),
            format,
            display_value: false,
            ..BarcodeOptions::default()
        }
    }

    #[test]
    fn label_size_is_bounded() {
        let mut opts = options(BarcodeSymbology::Code128, "HELLO");
        opts.display_value = true;
        opts.font_size = 200_000.0;
        assert!(render_barcode(&FontSource::Bitmap, &opts).is_err());

        // Without a label the size is never used.
        opts.display_value = false;
        assert!(render_barcode(&FontSource::Bitmap, &opts).is_ok());
    }

    #[test]
    fn ean13_is_95_modules_wide() {
        let image = render_barcode(&FontSource::Bitmap, &options(BarcodeSymbology::Ean13, "400638133393")).unwrap();
        assert_eq!(image.dimensions(), (95 * 2 + 20, 120));
        // Quiet zone stays background; the start guard is a bar.
        assert_eq!(image.get_pixel(5, 50).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(10, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn ean_check_digit_is_verified() {
        assert_eq!(ean_check_digit("400638133393"), 1);
        assert_eq!(strip_check_digit("4006381333931", 12).unwrap(), "400638133393");
        assert!(strip_check_digit("4006381333932", 12).is_err());
        assert!(strip_check_digit("40063813339A", 12).is_err());
    }

    #[test]
    fn every_symbology_encodes_a_typical_value() {
        let cases = [
            (BarcodeSymbology::Code128, "Mediaforge-42"),
            (BarcodeSymbology::Code39, "ABC123"),
            (BarcodeSymbology::Ean13, "5901234123457"),
            (BarcodeSymbology::Ean8, "9638507"),
            (BarcodeSymbology::Itf, "123456"),
            (BarcodeSymbology::Codabar, "40156"),
        ];
        for (format, text) in cases {
            let modules = format.encode(text).unwrap_or_else(|e| panic!("{format:?}: {e}"));
            assert!(modules.contains(&1), "{format:?} produced no bars");
        }
    }

    #[test]
    fn letters_in_ean_are_a_client_error() {
        let err = render_barcode(&FontSource::Bitmap, &options(BarcodeSymbology::Ean8, "abc")).unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[test]
    fn odd_itf_is_rejected() {
        assert!(BarcodeSymbology::Itf.encode("123").is_err());
    }

    #[test]
    fn codabar_guards_are_added_once() {
        assert_eq!(with_codabar_guards("40156"), "A40156A");
        assert_eq!(with_codabar_guards("b40156d"), "B40156D");
    }

    #[test]
    fn value_is_printed_under_the_bars() {
        let mut opts = options(BarcodeSymbology::Code128, "HI");
        opts.display_value = true;
        let image = render_barcode(&FontSource::Bitmap, &opts).unwrap();
        assert!(image.height() > 120);
        let below_bars = (110..image.height() - MARGIN)
            .any(|y| (0..image.width()).any(|x| image.get_pixel(x, y).0 == [0, 0, 0, 255]));
        assert!(below_bars);
    }

    #[test]
    fn format_names_deserialize() {
        let opts: BarcodeOptions = serde_json::from_str(r#"{"text":"1","format":"EAN13"}"#).unwrap();
        assert_eq!(opts.format, BarcodeSymbology::Ean13);
        assert!(opts.display_value);
    }
}
