// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR codes: encoding with `qrcode`, decoding with `rqrr`.

use image::{DynamicImage, Rgba, RgbaImage};
use mediaforge_core::{Color, MediaError, Result};
use qrcode::{EcLevel, QrCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

pub const MAX_QR_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum QrErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<QrErrorCorrection> for EcLevel {
    fn from(level: QrErrorCorrection) -> Self {
        match level {
            QrErrorCorrection::L => EcLevel::L,
            QrErrorCorrection::M => EcLevel::M,
            QrErrorCorrection::Q => EcLevel::Q,
            QrErrorCorrection::H => EcLevel::H,
        }
    }
}

/// JSON body of the qr-code route.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QrOptions {
    pub text: String,
    /// Edge length of the output image in pixels.
    pub size: u32,
    /// Quiet zone, in modules.
    pub margin: u32,
    pub dark_color: String,
    pub light_color: String,
    pub error_correction: QrErrorCorrection,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            size: 300,
            margin: 4,
            dark_color: "#000000".into(),
            light_color: "#ffffff".into(),
            error_correction: QrErrorCorrection::M,
        }
    }
}

/// Render a QR code as a square image of `size` pixels (larger when the
/// symbol needs more than one pixel per module). Modules are whole pixels and
/// the symbol is centred.
#[instrument(skip(options), fields(text_len = options.text.len(), size = options.size))]
pub fn render_qr(options: &QrOptions) -> Result<RgbaImage> {
    if options.text.is_empty() {
        return Err(MediaError::invalid("No text provided"));
    }
    if options.size == 0 || options.size > MAX_QR_SIZE {
        return Err(MediaError::invalid(format!(
            "Size must be between 1 and {MAX_QR_SIZE}"
        )));
    }
    let dark = Color::parse_hex(&options.dark_color)?;
    let light = Color::parse_hex(&options.light_color)?;

    let code = QrCode::with_error_correction_level(options.text.as_bytes(), options.error_correction.into())
        .map_err(|err| MediaError::invalid(format!("Text cannot be encoded as a QR code: {err}")))?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let margin = options.margin.min(20);
    let total = modules + 2 * margin;
    let module_px = (options.size / total).max(1);
    let canvas_size = options.size.max(total * module_px);
    let offset = (canvas_size - total * module_px) / 2 + margin * module_px;

    let mut canvas = RgbaImage::from_pixel(canvas_size, canvas_size, Rgba(light.to_array()));
    let ink = Rgba(dark.to_array());
    for (index, color) in colors.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let (mx, my) = (index as u32 % modules, index as u32 / modules);
        for dy in 0..module_px {
            for dx in 0..module_px {
                canvas.put_pixel(offset + mx * module_px + dx, offset + my * module_px + dy, ink);
            }
        }
    }

    debug!(modules, module_px, canvas_size, "QR code rendered");
    Ok(canvas)
}

/// Find and decode the first readable QR code in `image`.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn decode_qr(image: &DynamicImage) -> Result<String> {
    let luma = image.to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    debug!(grids = grids.len(), "QR grids detected");

    for grid in grids {
        match grid.decode() {
            Ok((_meta, content)) => return Ok(content),
            Err(err) => warn!(%err, "QR grid failed to decode"),
        }
    }
    Err(MediaError::invalid("No QR code found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(text: &str) -> QrOptions {
        QrOptions {
            text: text.into(),
            ..QrOptions::default()
        }
    }

    #[test]
    fn encode_then_decode_returns_the_text() {
        let text = "https://example.org/mediaforge?q=42";
        let image = render_qr(&options(text)).unwrap();
        let decoded = decode_qr(&DynamicImage::ImageRgba8(image)).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn high_correction_with_custom_colours_still_decodes() {
        let opts = QrOptions {
            dark_color: "#1a237e".into(),
            light_color: "#fffde7".into(),
            error_correction: QrErrorCorrection::H,
            ..options("colour test")
        };
        let image = render_qr(&opts).unwrap();
        assert_eq!(decode_qr(&DynamicImage::ImageRgba8(image)).unwrap(), "colour test");
    }

    #[test]
    fn output_is_requested_size_with_light_quiet_zone() {
        let image = render_qr(&options("abc")).unwrap();
        assert_eq!(image.dimensions(), (300, 300));
        assert_eq!(image.get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn blank_image_has_no_code() {
        let blank = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([255; 4])));
        let err = decode_qr(&blank).unwrap_err();
        assert_eq!(err.to_string(), "No QR code found");
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(render_qr(&options("")), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn error_correction_letters_deserialize() {
        let opts: QrOptions = serde_json::from_str(r#"{"text":"x","errorCorrection":"Q"}"#).unwrap();
        assert_eq!(opts.error_correction, QrErrorCorrection::Q);
        assert_eq!(opts.margin, 4);
    }
}
