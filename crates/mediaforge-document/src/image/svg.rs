// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SVG rasterisation via resvg.

use image::RgbaImage;
use mediaforge_core::{Color, MediaError, Result};
use resvg::{tiny_skia, usvg};
use tracing::{debug, instrument};

pub const DEFAULT_SVG_WIDTH: u32 = 800;
pub const DEFAULT_SVG_HEIGHT: u32 = 600;
pub const MAX_SVG_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, Copy)]
pub struct SvgOptions {
    /// Target box. With `keep_aspect` the output fits inside it.
    pub width: u32,
    pub height: u32,
    pub keep_aspect: bool,
    /// `None` leaves the canvas transparent.
    pub background: Option<Color>,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_SVG_WIDTH,
            height: DEFAULT_SVG_HEIGHT,
            keep_aspect: true,
            background: Some(Color::WHITE),
        }
    }
}

/// Output size for a drawing of `svg_width` x `svg_height` in the target box.
///
/// When the box is wider than the drawing the height is kept and the width
/// shrinks, otherwise the width is kept and the height shrinks.
pub fn fitted_size(svg_width: f32, svg_height: f32, options: &SvgOptions) -> (u32, u32) {
    if !options.keep_aspect || svg_width <= 0.0 || svg_height <= 0.0 {
        return (options.width, options.height);
    }
    let aspect = svg_width / svg_height;
    let (width, height) = (options.width as f32, options.height as f32);
    let (width, height) = if width / height > aspect {
        (height * aspect, height)
    } else {
        (width, width / aspect)
    };
    (
        (width.round() as u32).clamp(1, MAX_SVG_DIMENSION),
        (height.round() as u32).clamp(1, MAX_SVG_DIMENSION),
    )
}

/// Parse an SVG document and draw it scaled to the fitted size.
#[instrument(skip(data, options), fields(data_len = data.len()))]
pub fn render_svg(data: &[u8], options: &SvgOptions) -> Result<RgbaImage> {
    for side in [options.width, options.height] {
        if side == 0 || side > MAX_SVG_DIMENSION {
            return Err(MediaError::invalid(format!(
                "Width and height must be between 1 and {MAX_SVG_DIMENSION}"
            )));
        }
    }

    let mut parse_options = usvg::Options::default();
    parse_options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_data(data, &parse_options).map_err(|err| {
        debug!(error = %err, "SVG rejected");
        MediaError::invalid("Invalid SVG file")
    })?;

    let size = tree.size();
    let (width, height) = fitted_size(size.width(), size.height(), options);
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| MediaError::Image(format!("cannot allocate a {width}x{height} canvas")))?;
    if let Some(color) = options.background {
        pixmap.fill(tiny_skia::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
    }

    let transform = tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    debug!(width, height, "SVG rendered");

    let pixels: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let c = pixel.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| MediaError::Image("pixel buffer size mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50">
        <rect x="50" y="0" width="50" height="50" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn wide_box_keeps_the_height() {
        let options = SvgOptions::default();
        assert_eq!(fitted_size(100.0, 100.0, &options), (600, 600));
    }

    #[test]
    fn tall_box_keeps_the_width() {
        let options = SvgOptions {
            width: 400,
            height: 900,
            ..SvgOptions::default()
        };
        assert_eq!(fitted_size(200.0, 100.0, &options), (400, 200));
    }

    #[test]
    fn stretching_ignores_the_drawing() {
        let options = SvgOptions {
            keep_aspect: false,
            ..SvgOptions::default()
        };
        assert_eq!(fitted_size(10.0, 1000.0, &options), (800, 600));
    }

    #[test]
    fn drawing_is_scaled_onto_the_background() {
        let image = render_svg(SQUARE, &SvgOptions::default()).unwrap();
        assert_eq!(image.dimensions(), (800, 400));
        assert_eq!(image.get_pixel(100, 200).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(700, 200).0, [255, 0, 0, 255]);
    }

    #[test]
    fn transparent_canvas_stays_clear() {
        let options = SvgOptions {
            background: None,
            ..SvgOptions::default()
        };
        let image = render_svg(SQUARE, &options).unwrap();
        assert_eq!(image.get_pixel(100, 200).0[3], 0);
        assert_eq!(image.get_pixel(700, 200).0[3], 255);
    }

    #[test]
    fn bad_input_is_a_client_error() {
        let err = render_svg(b"<html>nope</html>", &SvgOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid SVG file");

        let options = SvgOptions {
            width: 0,
            ..SvgOptions::default()
        };
        let err = render_svg(SQUARE, &options).unwrap_err();
        assert!(err.to_string().starts_with("Width and height must be"));
    }
}
