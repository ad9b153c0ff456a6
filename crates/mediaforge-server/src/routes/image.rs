// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster image routes.

use image::DynamicImage;
use mediaforge_core::{Color, ImageFormat, MediaError, Result};
use mediaforge_document::image::background::{Backdrop, DEFAULT_TOLERANCE};
use mediaforge_document::image::base64::{decode_image, encode_image};
use mediaforge_document::image::palette::{DEFAULT_COLOR_COUNT, extract_palette};
use mediaforge_document::image::processor::decode;
use mediaforge_document::image::svg::{DEFAULT_SVG_HEIGHT, DEFAULT_SVG_WIDTH, render_svg};
use mediaforge_document::{
    BackgroundOptions, BackgroundRemover, FontSource, ImageProcessor, SvgOptions,
};
use tracing::{info, instrument};

use super::{download_name, encode, output_format, required_file};
use crate::http::{Request, Response};
use crate::state::AppState;

const CONVERT_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "avif", "tiff"];
const CONVERT_QUALITY: u8 = 90;

const OPTIMIZE_FORMATS: &[&str] = &["webp", "jpg", "jpeg", "png"];
const OPTIMIZE_QUALITY: u8 = 85;

const EDIT_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const EDIT_FILTERS: &[&str] = &["none", "grayscale", "sepia", "invert"];
const EDIT_QUALITY: u8 = 90;
const MAX_BLUR: f32 = 50.0;
const WATERMARK_PADDING: i32 = 10;

const MAX_PALETTE_COLORS: usize = 20;

const SVG_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const SVG_QUALITY: u8 = 95;

#[instrument(skip_all)]
pub fn convert_image(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let (name, format) = output_format(form.text("format"), CONVERT_FORMATS)?;

    let bytes = ImageProcessor::from_bytes(&file.data)?.encode(format, CONVERT_QUALITY)?;
    info!(format = %name, input = file.data.len(), output = bytes.len(), "image converted");
    Ok(Response::attachment(
        &format!("image/{name}"),
        &format!("converted.{name}"),
        bytes,
    ))
}

/// Resize without enlarging, then re-encode. The size headers let the
/// caller show the saving.
#[instrument(skip_all)]
pub fn optimize_image(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let (name, format) = output_format(Some(form.text("format").unwrap_or("webp")), OPTIMIZE_FORMATS)?;
    let quality = form.value::<u8>("quality").unwrap_or(OPTIMIZE_QUALITY).clamp(1, 100);
    let max_width = form.value::<u32>("maxWidth").filter(|w| *w > 0);
    let max_height = form.value::<u32>("maxHeight").filter(|h| *h > 0);

    let mut processor = ImageProcessor::from_bytes(&file.data)?;
    if max_width.is_some() || max_height.is_some() {
        processor = processor.resize_no_enlarge(
            max_width.unwrap_or(u32::MAX),
            max_height.unwrap_or(u32::MAX),
        );
    }
    let bytes = processor.encode(format, quality)?;

    let (original, optimized) = (file.data.len(), bytes.len());
    info!(format = %name, quality, original, optimized, "image optimized");
    Ok(Response::attachment(
        &format!("image/{name}"),
        &format!("optimized.{name}"),
        bytes,
    )
    .with_header("X-Original-Size", original.to_string())
    .with_header("X-Optimized-Size", optimized.to_string()))
}

#[instrument(skip_all)]
pub fn edit_image(state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let (name, format) = output_format(Some(form.text("format").unwrap_or("png")), EDIT_FORMATS)?;
    let filter = form.text("filter").unwrap_or("none");
    if !EDIT_FILTERS.contains(&filter) {
        return Err(MediaError::invalid(format!("Invalid filter: {filter}")));
    }
    let quality = form.value::<u8>("quality").unwrap_or(EDIT_QUALITY).clamp(1, 100);
    let rotation = finite(form.value("rotation"), 0.0);
    let brightness = finite(form.value("brightness"), 100.0).max(0.0);
    let contrast = finite(form.value("contrast"), 100.0).max(0.0);
    let blur = finite(form.value("blur"), 0.0).clamp(0.0, MAX_BLUR);

    let mut processor = ImageProcessor::from_bytes(&file.data)?;
    if rotation != 0.0 {
        processor = processor.rotate(rotation);
    }
    if form.flag("flipH") {
        processor = processor.flip_horizontal();
    }
    if form.flag("flipV") {
        processor = processor.flip_vertical();
    }
    processor = match filter {
        "grayscale" => processor.grayscale(),
        "sepia" => processor.sepia(),
        "invert" => processor.invert(),
        _ => processor,
    };
    if brightness != 100.0 {
        processor = processor.brightness(brightness);
    }
    if contrast != 100.0 {
        processor = processor.contrast(contrast);
    }
    if blur > 0.0 {
        processor = processor.blur(blur);
    }
    if let Some(text) = form.text("watermark") {
        processor = ImageProcessor::from_dynamic(watermark(state.font(), processor.as_dynamic(), text));
    }

    let bytes = processor.encode(format, quality)?;
    info!(format = %name, filter, rotation, bytes = bytes.len(), "image edited");
    Ok(Response::attachment(
        &format!("image/{name}"),
        &format!("edited.{name}"),
        bytes,
    ))
}

fn finite(value: Option<f32>, default: f32) -> f32 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

/// White outlined text in the bottom-right corner, scaled with the image.
fn watermark(font: &FontSource, image: &DynamicImage, text: &str) -> DynamicImage {
    let mut canvas = image.to_rgba8();
    let (width, height) = canvas.dimensions();
    let size = (width as f32 / 30.0).max(16.0);
    let (text_w, text_h) = font.measure(text, size);
    let x = width as i32 - text_w as i32 - WATERMARK_PADDING;
    let y = height as i32 - text_h as i32 - WATERMARK_PADDING;
    font.draw_outlined(&mut canvas, text, x, y, size, Color::WHITE, Color::BLACK, 1);
    DynamicImage::ImageRgba8(canvas)
}

#[instrument(skip_all)]
pub fn color_palette(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let count = form
        .value::<usize>("colorCount")
        .unwrap_or(DEFAULT_COLOR_COUNT)
        .clamp(1, MAX_PALETTE_COLORS);

    let image = decode(&file.data)?;
    let palette = extract_palette(&image, count);
    Ok(Response::json(200, &palette))
}

/// `mode=encode` (the default) turns an upload into a data URL; `mode=decode`
/// turns the `data` field back into a file.
#[instrument(skip_all)]
pub fn base64(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    match form.text("mode").unwrap_or("encode") {
        "encode" => {
            let file = required_file(&form, "file")?;
            Ok(Response::json(200, &encode_image(&file.data)?))
        }
        "decode" => {
            let data = form
                .text("data")
                .ok_or_else(|| MediaError::invalid("No data provided"))?;
            let decoded = decode_image(data)?;
            Ok(Response::attachment(
                decoded.mime_type,
                &format!("decoded.{}", decoded.extension),
                decoded.bytes,
            ))
        }
        _ => Err(MediaError::invalid("Invalid mode")),
    }
}

#[instrument(skip_all)]
pub fn remove_background(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let tolerance = form.value::<u8>("tolerance").unwrap_or(DEFAULT_TOLERANCE);

    let backdrop = if form.flag("replaceWithColor") {
        Backdrop::Solid(Color::parse_hex(form.text("bgColor").unwrap_or("#ffffff"))?)
    } else if let Some(background) = form.file("backgroundImage") {
        Backdrop::Image(decode(&background.data)?)
    } else {
        Backdrop::Transparent
    };

    let png = BackgroundRemover::new(BackgroundOptions { tolerance, backdrop }).process(&file.data)?;
    Ok(Response::attachment("image/png", "no-background.png", png))
}

/// Rasterise an uploaded SVG. JPEG has no alpha channel, so a transparent
/// request still gets the background colour there.
#[instrument(skip_all)]
pub fn svg_convert(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let (name, format) = output_format(Some(form.text("format").unwrap_or("png")), SVG_FORMATS)?;

    let background = if form.flag("transparent") && format != ImageFormat::Jpeg {
        None
    } else {
        Some(Color::parse_or(form.text("backgroundColor"), Color::WHITE)?)
    };
    let options = SvgOptions {
        width: form.value("width").unwrap_or(DEFAULT_SVG_WIDTH),
        height: form.value("height").unwrap_or(DEFAULT_SVG_HEIGHT),
        keep_aspect: form
            .text("maintainAspectRatio")
            .is_none_or(|value| !value.eq_ignore_ascii_case("false")),
        background,
    };

    let image = render_svg(&file.data, &options)?;
    let (width, height) = image.dimensions();
    let bytes = encode(DynamicImage::ImageRgba8(image), format, SVG_QUALITY)?;
    info!(format = %name, width, height, output = bytes.len(), "SVG converted");

    let filename = download_name(file.filename.as_deref(), &["svg"], format.extension(), "converted");
    Ok(Response::attachment(format.mime_type(), &filename, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::tests::FormBuilder;
    use crate::routes::tests::{call, error_message, multipart_request, sample_png};

    fn upload(path: &str, form: FormBuilder) -> Response {
        call(&multipart_request(path, form.file("file", "in.png", &sample_png(40, 20))))
    }

    #[test]
    fn convert_answers_with_the_requested_format_literal() {
        for format in CONVERT_FORMATS {
            let response = upload("/api/convert-image", FormBuilder::default().text("format", format));
            assert_eq!(response.status, 200, "{format}");
            assert_eq!(
                response.header("Content-Type"),
                Some(format!("image/{format}").as_str())
            );
            assert_eq!(
                response.header("Content-Disposition"),
                Some(format!("attachment; filename=\"converted.{format}\"").as_str())
            );
            assert!(!response.body.is_empty());
        }
    }

    #[test]
    fn convert_rejects_unknown_formats() {
        let response = upload("/api/convert-image", FormBuilder::default().text("format", "bmp"));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "Invalid format");
    }

    #[test]
    fn optimize_reports_sizes_and_respects_bounds() {
        let form = FormBuilder::default()
            .text("format", "png")
            .text("maxWidth", "10");
        let response = upload("/api/optimize-image", form);
        assert_eq!(response.status, 200);
        assert!(response.header("X-Original-Size").is_some());
        assert_eq!(
            response.header("X-Optimized-Size"),
            Some(response.body.len().to_string().as_str())
        );
        let image = image::load_from_memory(&response.body).unwrap();
        assert_eq!((image.width(), image.height()), (10, 5));
    }

    #[test]
    fn edit_applies_flip_and_filter() {
        let form = FormBuilder::default()
            .text("flipH", "true")
            .text("filter", "grayscale")
            .text("watermark", "mf");
        let response = upload("/api/edit-image", form);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/png"));
        let image = image::load_from_memory(&response.body).unwrap().to_rgba8();
        let [r, g, b, _] = image.get_pixel(0, 0).0;
        assert!(r == g && g == b, "grayscale expected");
    }

    #[test]
    fn edit_rejects_unknown_filters() {
        let response = upload("/api/edit-image", FormBuilder::default().text("filter", "vintage"));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "Invalid filter: vintage");
    }

    #[test]
    fn palette_is_bounded_and_sorted() {
        let response = upload("/api/color-palette", FormBuilder::default().text("colorCount", "1"));
        assert_eq!(response.status, 200);
        let colors: Vec<serde_json::Value> = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(colors.len(), 1);

        let response = upload("/api/color-palette", FormBuilder::default());
        let colors: Vec<serde_json::Value> = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(colors.len(), 2);
        assert!(colors[0]["count"].as_u64() >= colors[1]["count"].as_u64());
    }

    #[test]
    fn base64_round_trip() {
        let response = upload("/api/base64", FormBuilder::default().text("mode", "encode"));
        assert_eq!(response.status, 200);
        let encoded: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(encoded["mimeType"], "image/png");
        let data_url = encoded["dataUrl"].as_str().unwrap();

        let form = FormBuilder::default()
            .text("mode", "decode")
            .text("data", data_url);
        let response = call(&multipart_request("/api/base64", form));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/png"));
        assert_eq!(response.body, sample_png(40, 20));
    }

    #[test]
    fn base64_mode_is_checked() {
        let response = upload("/api/base64", FormBuilder::default().text("mode", "rot13"));
        assert_eq!(error_message(&response), "Invalid mode");
    }

    #[test]
    fn background_removal_returns_png() {
        let response = upload("/api/remove-background", FormBuilder::default());
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/png"));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"no-background.png\"")
        );
    }

    #[test]
    fn background_colour_must_parse() {
        let form = FormBuilder::default()
            .text("replaceWithColor", "true")
            .text("bgColor", "not-a-colour");
        let response = upload("/api/remove-background", form);
        assert_eq!(response.status, 400);
    }

    const BADGE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20">
        <rect width="40" height="20" fill="#00ff00"/>
    </svg>"##;

    fn svg(form: FormBuilder) -> Response {
        call(&multipart_request("/api/svg-convert", form.file("file", "badge.svg", BADGE)))
    }

    #[test]
    fn svg_fits_the_default_box() {
        let response = svg(FormBuilder::default());
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/png"));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"badge.png\"")
        );
        let image = ::image::load_from_memory(&response.body).unwrap();
        assert_eq!((image.width(), image.height()), (800, 400));
    }

    #[test]
    fn svg_can_be_stretched_to_jpeg() {
        let form = FormBuilder::default()
            .text("format", "jpeg")
            .text("width", "100")
            .text("height", "100")
            .text("maintainAspectRatio", "false")
            .text("transparent", "true");
        let response = svg(form);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"badge.jpg\"")
        );
        let image = ::image::load_from_memory(&response.body).unwrap();
        assert_eq!((image.width(), image.height()), (100, 100));
    }

    #[test]
    fn svg_rejects_bad_uploads_and_formats() {
        let response = call(&multipart_request(
            "/api/svg-convert",
            FormBuilder::default().file("file", "x.svg", b"not svg at all"),
        ));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "Invalid SVG file");

        let response = svg(FormBuilder::default().text("format", "avif"));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "Invalid format");

        let response = svg(FormBuilder::default().text("width", "100000"));
        assert_eq!(response.status, 400);
    }
}
