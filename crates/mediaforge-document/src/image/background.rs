// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background removal: estimate the backdrop colour from the image border,
// flood-fill it from the edges, and replace it with transparency, a solid
// colour, or another image.

use std::collections::VecDeque;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use mediaforge_core::{Color, MediaError, Result};
use tracing::{debug, info, instrument};

pub const DEFAULT_TOLERANCE: u8 = 40;

/// What to put behind the extracted subject.
#[derive(Debug, Clone, Default)]
pub enum Backdrop {
    /// Leave the background transparent.
    #[default]
    Transparent,
    /// Composite over a solid colour.
    Solid(Color),
    /// Composite over another image, scaled to cover the subject's canvas.
    Image(DynamicImage),
}

#[derive(Debug, Clone)]
pub struct BackgroundOptions {
    /// Maximum Euclidean RGB distance from the backdrop colour that still
    /// counts as background.
    pub tolerance: u8,
    pub backdrop: Backdrop,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            backdrop: Backdrop::Transparent,
        }
    }
}

/// Separates a subject from a roughly uniform backdrop.
pub struct BackgroundRemover {
    options: BackgroundOptions,
}

impl BackgroundRemover {
    pub fn new(options: BackgroundOptions) -> Self {
        Self { options }
    }

    /// Remove the background and return the composited image as PNG bytes.
    #[instrument(skip(self, data), fields(data_len = data.len(), tolerance = self.options.tolerance))]
    pub fn process(&self, data: &[u8]) -> Result<Vec<u8>> {
        let image = crate::image::processor::decode(data)?;
        let result = self.apply(&image);
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(result)
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .map_err(|err| MediaError::Image(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Remove the background from a decoded image.
    pub fn apply(&self, image: &DynamicImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        let background = estimate_background(&rgba);
        info!(background = %background.to_hex(), "Estimated background colour");

        let mask = background_mask(&rgba, background, self.options.tolerance);
        let alpha = feather(&mask);

        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            let keep = alpha.get_pixel(x, y).0[0] as u16;
            pixel.0[3] = ((pixel.0[3] as u16 * keep) / 255) as u8;
        }

        match &self.options.backdrop {
            Backdrop::Transparent => rgba,
            Backdrop::Solid(color) => {
                let mut canvas = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba(color.to_array()));
                imageops::overlay(&mut canvas, &rgba, 0, 0);
                canvas
            }
            Backdrop::Image(backdrop) => {
                let mut canvas = backdrop
                    .resize_to_fill(rgba.width(), rgba.height(), FilterType::Lanczos3)
                    .to_rgba8();
                imageops::overlay(&mut canvas, &rgba, 0, 0);
                canvas
            }
        }
    }
}

/// Per-channel median of the outermost ring of pixels.
pub fn estimate_background(image: &RgbaImage) -> Color {
    let (width, height) = image.dimensions();
    let mut channels: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    for (x, y) in border_coordinates(width, height) {
        let pixel = image.get_pixel(x, y).0;
        for (channel, values) in channels.iter_mut().enumerate() {
            values.push(pixel[channel]);
        }
    }

    let median = |values: &mut Vec<u8>| {
        values.sort_unstable();
        values.get(values.len() / 2).copied().unwrap_or(255)
    };
    let [mut r, mut g, mut b] = channels;
    Color::rgb(median(&mut r), median(&mut g), median(&mut b))
}

/// 255 where the pixel is connected to the border through near-background
/// pixels, 0 elsewhere.
fn background_mask(image: &RgbaImage, background: Color, tolerance: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut mask = GrayImage::new(width, height);
    let limit = (tolerance as u32).pow(2);

    let matches = |x: u32, y: u32| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        if a == 0 {
            return true;
        }
        let dr = r as i32 - background.r as i32;
        let dg = g as i32 - background.g as i32;
        let db = b as i32 - background.b as i32;
        ((dr * dr + dg * dg + db * db) as u32) <= limit
    };

    let mut queue: VecDeque<(u32, u32)> = border_coordinates(width, height)
        .filter(|&(x, y)| matches(x, y))
        .collect();
    for &(x, y) in &queue {
        mask.put_pixel(x, y, Luma([255]));
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx >= width || ny >= height || mask.get_pixel(nx, ny).0[0] == 255 {
                continue;
            }
            if matches(nx, ny) {
                mask.put_pixel(nx, ny, Luma([255]));
                queue.push_back((nx, ny));
            }
        }
    }

    let removed = mask.pixels().filter(|p| p.0[0] == 255).count();
    debug!(removed, total = (width * height) as usize, "Background mask built");
    mask
}

/// Convert a background mask into a foreground alpha mask, softening the
/// one-pixel edge where subject meets background.
fn feather(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y).0[0] == 255 {
            return Luma([0]);
        }
        let mut background_neighbours = 0u32;
        let mut total = 0u32;
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let (nx, ny) = (x as i32 + dx, y as i32 + dy);
                if (dx, dy) == (0, 0) || nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                    continue;
                }
                total += 1;
                if mask.get_pixel(nx as u32, ny as u32).0[0] == 255 {
                    background_neighbours += 1;
                }
            }
        }
        if background_neighbours == 0 || total == 0 {
            Luma([255])
        } else {
            let softened = 255 - (background_neighbours * 127 / total);
            Luma([softened as u8])
        }
    })
}

fn border_coordinates(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let top_bottom = (0..width).flat_map(move |x| [(x, 0), (x, height.saturating_sub(1))]);
    let sides = (1..height.saturating_sub(1)).flat_map(move |y| [(0, y), (width.saturating_sub(1), y)]);
    top_bottom.chain(sides)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 40x40 light-grey backdrop with a 10x10 dark square in the middle.
    fn subject_on_backdrop() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 40, |x, y| {
            if (15..25).contains(&x) && (15..25).contains(&y) {
                Rgba([20, 30, 200, 255])
            } else {
                Rgba([235, 235, 235, 255])
            }
        }))
    }

    #[test]
    fn background_estimate_from_border() {
        let rgba = subject_on_backdrop().to_rgba8();
        assert_eq!(estimate_background(&rgba), Color::rgb(235, 235, 235));
    }

    #[test]
    fn corners_become_transparent_and_subject_stays_opaque() {
        let remover = BackgroundRemover::new(BackgroundOptions::default());
        let out = remover.apply(&subject_on_backdrop());
        for (x, y) in [(0, 0), (39, 0), (0, 39), (39, 39)] {
            assert_eq!(out.get_pixel(x, y).0[3], 0, "corner ({x},{y})");
        }
        assert_eq!(out.get_pixel(20, 20).0[3], 255);
        // Edge pixels of the subject are softened, not removed.
        let edge = out.get_pixel(15, 20).0[3];
        assert!(edge > 0 && edge < 255, "edge alpha {edge}");
    }

    #[test]
    fn solid_backdrop_fills_removed_area() {
        let remover = BackgroundRemover::new(BackgroundOptions {
            backdrop: Backdrop::Solid(Color::rgb(255, 0, 0)),
            ..BackgroundOptions::default()
        });
        let out = remover.apply(&subject_on_backdrop());
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(20, 20), Rgba([20, 30, 200, 255]));
    }

    #[test]
    fn image_backdrop_is_scaled_to_canvas() {
        let backdrop = DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 8, Rgba([0, 200, 0, 255])));
        let remover = BackgroundRemover::new(BackgroundOptions {
            backdrop: Backdrop::Image(backdrop),
            ..BackgroundOptions::default()
        });
        let out = remover.apply(&subject_on_backdrop());
        assert_eq!(out.dimensions(), (40, 40));
        assert_eq!(*out.get_pixel(1, 1), Rgba([0, 200, 0, 255]));
    }

    #[test]
    fn zero_tolerance_only_removes_exact_matches() {
        let remover = BackgroundRemover::new(BackgroundOptions {
            tolerance: 0,
            ..BackgroundOptions::default()
        });
        let out = remover.apply(&subject_on_backdrop());
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(20, 20).0[3], 255);
    }

    #[test]
    fn process_returns_png() {
        let mut png = Vec::new();
        subject_on_backdrop()
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let out = BackgroundRemover::new(BackgroundOptions::default())
            .process(&png)
            .unwrap();
        assert_eq!(&out[1..4], b"PNG");
    }
}
