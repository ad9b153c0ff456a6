// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// App icon generation: square, centre-cropped icons for favicon, iOS,
// Android and PWA size sets, packed as ICO or delivered as a single PNG.

use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, Rgba, RgbaImage};
use mediaforge_core::{Color, MediaError, Result};
use tracing::{debug, info, instrument};

/// The largest edge the ICO container can describe.
const ICO_MAX_SIZE: u32 = 256;
pub const MAX_ICON_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconPlatform {
    Favicon,
    Ios,
    Android,
    Pwa,
    #[default]
    All,
}

impl IconPlatform {
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("all") => Ok(Self::All),
            Some("favicon") => Ok(Self::Favicon),
            Some("ios") => Ok(Self::Ios),
            Some("android") => Ok(Self::Android),
            Some("pwa") => Ok(Self::Pwa),
            Some(other) => Err(MediaError::invalid(format!("Unknown platform: {other}"))),
        }
    }

    /// Icon edge lengths for the platform, largest first.
    pub fn sizes(&self) -> Vec<u32> {
        let mut sizes: Vec<u32> = match self {
            Self::Favicon => vec![16, 32, 48, 64],
            Self::Ios => vec![180, 167, 152, 120, 87, 80, 76, 60],
            Self::Android => vec![512, 192, 144, 96, 72, 48],
            Self::Pwa => vec![512, 192],
            Self::All => [Self::Favicon, Self::Ios, Self::Android, Self::Pwa]
                .iter()
                .flat_map(|p| p.sizes())
                .collect(),
        };
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes.dedup();
        sizes
    }
}

/// Square icon settings.
#[derive(Debug, Clone, Copy)]
pub struct IconStyle {
    /// Inset on each side, as a percentage of the icon edge (0..=40).
    pub padding_percent: u32,
    pub background: Color,
}

impl Default for IconStyle {
    fn default() -> Self {
        Self {
            padding_percent: 0,
            background: Color::WHITE,
        }
    }
}

/// Generated icon payload.
#[derive(Debug, Clone)]
pub enum IconOutput {
    Ico(Vec<u8>),
    Png { size: u32, bytes: Vec<u8> },
}

/// Render one `size` x `size` icon: centre-crop to a square, then scale into
/// the padded area over the background colour.
pub fn render_icon(image: &DynamicImage, size: u32, style: IconStyle) -> RgbaImage {
    let (w, h) = (image.width(), image.height());
    let side = w.min(h);
    let square = image.crop_imm((w - side) / 2, (h - side) / 2, side, side);

    let padding = size * style.padding_percent.min(40) / 100;
    let inner = size.saturating_sub(2 * padding).max(1);
    let scaled = square.resize_exact(inner, inner, FilterType::Lanczos3).to_rgba8();

    let mut canvas = RgbaImage::from_pixel(size, size, Rgba(style.background.to_array()));
    imageops::overlay(&mut canvas, &scaled, padding as i64, padding as i64);
    canvas
}

/// Produce the icon set for `platform`. An explicit `size` always yields one
/// PNG. Otherwise favicon and `all` sets are packed into a multi-resolution
/// ICO (sizes up to 256), and the other platforms yield their largest PNG.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn generate_icons(
    image: &DynamicImage,
    platform: IconPlatform,
    size: Option<u32>,
    style: IconStyle,
) -> Result<IconOutput> {
    if let Some(size) = size {
        if size == 0 || size > MAX_ICON_SIZE {
            return Err(MediaError::invalid(format!(
                "Icon size must be between 1 and {MAX_ICON_SIZE}"
            )));
        }
        return Ok(IconOutput::Png {
            size,
            bytes: encode_png(&render_icon(image, size, style))?,
        });
    }

    match platform {
        IconPlatform::Favicon | IconPlatform::All => {
            let sizes: Vec<u32> = platform
                .sizes()
                .into_iter()
                .filter(|s| *s <= ICO_MAX_SIZE)
                .collect();
            let mut frames = Vec::with_capacity(sizes.len());
            for s in &sizes {
                let png = encode_png(&render_icon(image, *s, style))?;
                let frame = IcoFrame::as_png(&png, *s, *s, ExtendedColorType::Rgba8)
                    .map_err(|err| MediaError::Image(format!("ICO frame failed: {err}")))?;
                frames.push(frame);
            }
            let mut buffer = Vec::new();
            IcoEncoder::new(&mut buffer)
                .encode_images(&frames)
                .map_err(|err| MediaError::Image(format!("ICO encoding failed: {err}")))?;
            info!(?platform, frames = sizes.len(), "ICO generated");
            Ok(IconOutput::Ico(buffer))
        }
        _ => {
            let largest = platform.sizes().first().copied().unwrap_or(ICO_MAX_SIZE);
            debug!(?platform, largest, "Single icon generated");
            Ok(IconOutput::Png {
                size: largest,
                bytes: encode_png(&render_icon(image, largest, style))?,
            })
        }
    }
}

fn encode_png(icon: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    icon.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|err| MediaError::Image(format!("PNG encoding failed: {err}")))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landscape() -> DynamicImage {
        // Red centre square flanked by blue bars that the crop removes.
        DynamicImage::ImageRgba8(RgbaImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }))
    }

    #[test]
    fn platform_size_sets() {
        assert_eq!(IconPlatform::Favicon.sizes(), vec![64, 48, 32, 16]);
        assert_eq!(IconPlatform::Pwa.sizes(), vec![512, 192]);
        let all = IconPlatform::All.sizes();
        assert_eq!(all.first(), Some(&512));
        assert_eq!(all.iter().filter(|s| **s == 48).count(), 1);
        assert!(IconPlatform::parse(Some("windows")).is_err());
    }

    #[test]
    fn icon_is_centre_cropped() {
        let icon = render_icon(&landscape(), 32, IconStyle::default());
        assert_eq!(icon.dimensions(), (32, 32));
        assert_eq!(*icon.get_pixel(1, 16), Rgba([255, 0, 0, 255]));
        assert_eq!(*icon.get_pixel(30, 16), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn padding_shows_background() {
        let style = IconStyle {
            padding_percent: 25,
            background: Color::rgb(0, 255, 0),
        };
        let icon = render_icon(&landscape(), 40, style);
        assert_eq!(*icon.get_pixel(2, 2), Rgba([0, 255, 0, 255]));
        assert_eq!(*icon.get_pixel(20, 20), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn favicon_set_is_an_ico_with_four_frames() {
        let out = generate_icons(&landscape(), IconPlatform::Favicon, None, IconStyle::default()).unwrap();
        let IconOutput::Ico(bytes) = out else {
            panic!("expected ICO");
        };
        // ICONDIR: reserved 0, type 1, count.
        assert_eq!(&bytes[..4], &[0, 0, 1, 0]);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 4);
    }

    #[test]
    fn explicit_size_is_a_png() {
        let out = generate_icons(&landscape(), IconPlatform::Ios, Some(57), IconStyle::default()).unwrap();
        let IconOutput::Png { size, bytes } = out else {
            panic!("expected PNG");
        };
        assert_eq!(size, 57);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (57, 57));
    }

    #[test]
    fn android_without_size_gives_largest() {
        let out = generate_icons(&landscape(), IconPlatform::Android, None, IconStyle::default()).unwrap();
        assert!(matches!(out, IconOutput::Png { size: 512, .. }));
    }

    #[test]
    fn oversize_request_is_rejected() {
        assert!(generate_icons(&landscape(), IconPlatform::All, Some(5000), IconStyle::default()).is_err());
    }
}
