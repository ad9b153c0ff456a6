// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: format conversion, geometry (resize, crop, rotate, flip)
// and colour filters (brightness, contrast, grayscale, sepia, invert, blur,
// normalize, sharpen). Operates on in-memory images using the `image` and
// `imageproc` crates.

use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use mediaforge_core::{Color, ImageFormat, MediaError, Result};
use tracing::{debug, info, instrument};

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 8;

/// Image processing pipeline operating on a single in-memory image.
///
/// Every transformation consumes `self` and returns the transformed processor,
/// so operations chain:
///
/// ```ignore
/// let bytes = ImageProcessor::from_bytes(&upload)?
///     .resize_no_enlarge(1920, 1080)
///     .grayscale()
///     .encode(ImageFormat::Webp, 85)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode an image from encoded bytes (format is sniffed).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = decode(data)?;
        debug!(width = image.width(), height = image.height(), "Image decoded");
        Ok(Self { image })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Geometry -------------------------------------------------------------

    /// Fit inside `max_width` x `max_height`, preserving aspect ratio. Small
    /// images are scaled up.
    #[instrument(skip(self))]
    pub fn resize(self, max_width: u32, max_height: u32) -> Self {
        let resized = self
            .image
            .resize(max_width.max(1), max_height.max(1), FilterType::Lanczos3);
        debug!(new_w = resized.width(), new_h = resized.height(), "Resize complete");
        Self { image: resized }
    }

    /// Like [`resize`](Self::resize) but never enlarges.
    pub fn resize_no_enlarge(self, max_width: u32, max_height: u32) -> Self {
        if self.width() <= max_width && self.height() <= max_height {
            return self;
        }
        self.resize(max_width, max_height)
    }

    /// Scale to cover `width` x `height` and centre-crop the overflow.
    pub fn resize_to_fill(self, width: u32, height: u32) -> Self {
        Self {
            image: self
                .image
                .resize_to_fill(width.max(1), height.max(1), FilterType::Lanczos3),
        }
    }

    /// Rotate clockwise by `degrees`. Multiples of 90 are lossless and swap
    /// the canvas dimensions; other angles rotate about the centre on a
    /// transparent background, keeping the canvas size.
    #[instrument(skip(self))]
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        let near = |target: f32| (normalised - target).abs() < 0.01;

        let image = if near(0.0) || near(360.0) {
            self.image
        } else if near(90.0) {
            self.image.rotate90()
        } else if near(180.0) {
            self.image.rotate180()
        } else if near(270.0) {
            self.image.rotate270()
        } else {
            let rgba = self.image.to_rgba8();
            DynamicImage::ImageRgba8(geometric_transformations::rotate_about_center(
                &rgba,
                normalised.to_radians(),
                Interpolation::Bilinear,
                Rgba([255, 255, 255, 0]),
            ))
        };
        Self { image }
    }

    pub fn flip_horizontal(self) -> Self {
        Self {
            image: self.image.fliph(),
        }
    }

    pub fn flip_vertical(self) -> Self {
        Self {
            image: self.image.flipv(),
        }
    }

    // -- Colour filters -------------------------------------------------------

    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageRgba8(self.image.grayscale().to_rgba8()),
        }
    }

    /// Full-strength sepia tone (the CSS `sepia(100%)` matrix).
    pub fn sepia(self) -> Self {
        self.map_rgb(|r, g, b| {
            let (r, g, b) = (r as f32, g as f32, b as f32);
            (
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            )
        })
    }

    pub fn invert(mut self) -> Self {
        let mut rgba = self.image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            for channel in &mut pixel.0[..3] {
                *channel = 255 - *channel;
            }
        }
        self.image = DynamicImage::ImageRgba8(rgba);
        self
    }

    /// Scale brightness by `percent` (100 leaves the image unchanged).
    pub fn brightness(self, percent: f32) -> Self {
        if (percent - 100.0).abs() < f32::EPSILON {
            return self;
        }
        let factor = percent.max(0.0) / 100.0;
        self.map_rgb(|r, g, b| (r as f32 * factor, g as f32 * factor, b as f32 * factor))
    }

    /// Scale contrast around mid-grey by `percent` (100 leaves it unchanged).
    pub fn contrast(self, percent: f32) -> Self {
        if (percent - 100.0).abs() < f32::EPSILON {
            return self;
        }
        let factor = percent.max(0.0) / 100.0;
        let adjust = |c: u8| factor * (c as f32 - 128.0) + 128.0;
        self.map_rgb(|r, g, b| (adjust(r), adjust(g), adjust(b)))
    }

    /// Gaussian blur with the given sigma in pixels. Zero is a no-op.
    pub fn blur(self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self;
        }
        Self {
            image: self.image.blur(sigma),
        }
    }

    /// Stretch each channel so that the 1st..99th luminance percentiles span
    /// the full 0..255 range.
    #[instrument(skip(self))]
    pub fn normalize(self) -> Self {
        let luma = self.image.to_luma8();
        let mut histogram = [0u64; 256];
        for pixel in luma.pixels() {
            histogram[pixel.0[0] as usize] += 1;
        }
        let total: u64 = histogram.iter().sum();
        if total == 0 {
            return self;
        }

        let percentile = |fraction: f64| -> u8 {
            let target = (total as f64 * fraction).ceil() as u64;
            let mut seen = 0u64;
            for (value, &count) in histogram.iter().enumerate() {
                seen += count;
                if seen >= target.max(1) {
                    return value as u8;
                }
            }
            255
        };

        let low = percentile(0.01) as f32;
        let high = percentile(0.99) as f32;
        if high - low < 1.0 {
            debug!(low, high, "Flat histogram, skipping normalize");
            return self;
        }
        info!(low, high, "Normalizing contrast");

        let scale = 255.0 / (high - low);
        self.map_rgb(|r, g, b| {
            (
                (r as f32 - low) * scale,
                (g as f32 - low) * scale,
                (b as f32 - low) * scale,
            )
        })
    }

    /// Unsharp-mask sharpening tuned for document text.
    pub fn sharpen(self) -> Self {
        Self {
            image: self.image.unsharpen(1.0, 2),
        }
    }

    /// Composite over a solid colour, removing transparency.
    pub fn flatten(self, background: Color) -> Self {
        let rgba = self.image.to_rgba8();
        let flattened = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let alpha = a as f32 / 255.0;
            let blend = |fg: u8, bg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;
            Rgba([
                blend(r, background.r),
                blend(g, background.g),
                blend(b, background.b),
                255,
            ])
        });
        Self {
            image: DynamicImage::ImageRgba8(flattened),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode to `format`. `quality` (1..=100) applies to JPEG and AVIF; PNG,
    /// TIFF and WebP are written losslessly.
    #[instrument(skip(self), fields(width = self.width(), height = self.height()))]
    pub fn encode(&self, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
        let quality = quality.clamp(1, 100);
        let mut buffer = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
                self.image
                    .to_rgb8()
                    .write_with_encoder(encoder)
                    .map_err(|err| encode_error("JPEG", err))?;
            }
            ImageFormat::Avif => {
                let encoder = AvifEncoder::new_with_speed_quality(&mut buffer, AVIF_SPEED, quality);
                self.image
                    .to_rgba8()
                    .write_with_encoder(encoder)
                    .map_err(|err| encode_error("AVIF", err))?;
            }
            ImageFormat::Png => {
                self.image
                    .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
                    .map_err(|err| encode_error("PNG", err))?;
            }
            ImageFormat::Webp => {
                DynamicImage::ImageRgba8(self.image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::WebP)
                    .map_err(|err| encode_error("WebP", err))?;
            }
            ImageFormat::Tiff => {
                DynamicImage::ImageRgba8(self.image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Tiff)
                    .map_err(|err| encode_error("TIFF", err))?;
            }
        }

        debug!(?format, quality, bytes = buffer.len(), "Image encoded");
        Ok(buffer)
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        self.encode(ImageFormat::Png, 100)
    }

    // -- Helpers --------------------------------------------------------------

    /// Apply a per-pixel RGB mapping; results are clamped, alpha is kept.
    fn map_rgb(self, f: impl Fn(u8, u8, u8) -> (f32, f32, f32)) -> Self {
        let mut rgba = self.image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let (nr, ng, nb) = f(r, g, b);
            *pixel = Rgba([clamp_channel(nr), clamp_channel(ng), clamp_channel(nb), a]);
        }
        Self {
            image: DynamicImage::ImageRgba8(rgba),
        }
    }
}

/// Decode any supported image from bytes.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    if data.is_empty() {
        return Err(MediaError::invalid("Uploaded file is empty"));
    }
    image::load_from_memory(data)
        .map_err(|err| MediaError::Image(format!("failed to decode image: {err}")))
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn encode_error(kind: &str, err: image::ImageError) -> MediaError {
    MediaError::Image(format!("{kind} encoding failed: {err}"))
}
