// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text rendering and compositing routes.

use image::DynamicImage;
use mediaforge_core::{Color, Result};
use mediaforge_document::TextImageOptions;
use mediaforge_document::compose::collage::{CollageLayout, DEFAULT_SPACING, make_collage};
use mediaforge_document::compose::icons::{IconOutput, IconPlatform, IconStyle, generate_icons};
use mediaforge_document::compose::meme::{MemeOptions, render_meme};
use mediaforge_document::compose::placeholder::{PlaceholderOptions, render_placeholder};
use mediaforge_document::image::processor::decode;
use tracing::{info, instrument};

use super::{encode, encode_png, output_format, required_file, required_files};
use crate::http::{Request, Response};
use crate::state::AppState;

const PLACEHOLDER_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const MEME_FONT_RANGE: (f32, f32) = (8.0, 200.0);
const MAX_STROKE_WIDTH: u32 = 10;

#[instrument(skip_all)]
pub fn text_to_image(state: &AppState, request: &Request) -> Result<Response> {
    let options: TextImageOptions = request.json()?;
    let bytes = state.text().render_text_image(&options)?;
    let name = options.format.trim().to_ascii_lowercase();
    Ok(Response::attachment(
        &format!("image/{name}"),
        &format!("text-image.{name}"),
        bytes,
    ))
}

#[instrument(skip_all)]
pub fn meme(state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let defaults = MemeOptions::default();
    let options = MemeOptions {
        top_text: form.text("topText").unwrap_or_default().to_string(),
        bottom_text: form.text("bottomText").unwrap_or_default().to_string(),
        font_size: form
            .value::<f32>("fontSize")
            .filter(|size| size.is_finite())
            .unwrap_or(defaults.font_size)
            .clamp(MEME_FONT_RANGE.0, MEME_FONT_RANGE.1),
        text_color: Color::parse_or(form.text("textColor"), defaults.text_color)?,
        stroke_color: Color::parse_or(form.text("strokeColor"), defaults.stroke_color)?,
        stroke_width: form
            .value::<u32>("strokeWidth")
            .unwrap_or(defaults.stroke_width)
            .min(MAX_STROKE_WIDTH),
    };

    let image = decode(&file.data)?;
    let meme = render_meme(&image, state.font(), &options)?;
    Ok(Response::attachment("image/png", "meme.png", encode_png(meme)?))
}

#[instrument(skip_all)]
pub fn placeholder(state: &AppState, request: &Request) -> Result<Response> {
    let options: PlaceholderOptions = request.json()?;
    let (name, format) = output_format(Some(options.format.as_str()), PLACEHOLDER_FORMATS)?;
    let canvas = render_placeholder(state.font(), &options)?;
    let bytes = encode(DynamicImage::ImageRgba8(canvas), format, 90)?;
    Ok(Response::attachment(
        &format!("image/{name}"),
        &format!("placeholder-{}x{}.{name}", options.width, options.height),
        bytes,
    ))
}

#[instrument(skip_all)]
pub fn collage(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let files = required_files(&form, "files")?;
    let layout = CollageLayout::parse(form.text("layout"));
    let spacing = form.value::<u32>("spacing").unwrap_or(DEFAULT_SPACING);
    let background = Color::parse_or(form.text("backgroundColor"), Color::WHITE)?;

    let images = files
        .iter()
        .map(|part| decode(&part.data))
        .collect::<Result<Vec<_>>>()?;
    let canvas = make_collage(&images, layout, spacing, background)?;
    info!(?layout, images = images.len(), "collage composed");
    Ok(Response::attachment("image/png", "collage.png", encode_png(canvas)?))
}

#[instrument(skip_all)]
pub fn icons(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let platform = IconPlatform::parse(form.text("platform"))?;
    let size = form.value::<u32>("size");
    let style = IconStyle {
        padding_percent: form.value::<u32>("padding").unwrap_or(0),
        background: Color::parse_or(form.text("backgroundColor"), IconStyle::default().background)?,
    };

    let image = decode(&file.data)?;
    match generate_icons(&image, platform, size, style)? {
        IconOutput::Ico(bytes) => Ok(Response::attachment("image/x-icon", "favicon.ico", bytes)),
        IconOutput::Png { size, bytes } => Ok(Response::attachment(
            "image/png",
            &format!("icon-{size}.png"),
            bytes,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::tests::FormBuilder;
    use crate::routes::tests::{call, error_message, json_request, multipart_request, sample_png};

    #[test]
    fn text_image_uses_the_requested_format() {
        let response = call(&json_request(
            "/api/text-to-image",
            r#"{"text":"Hello Mediaforge","width":200,"height":80,"format":"jpg"}"#,
        ));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/jpg"));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"text-image.jpg\"")
        );
        let image = image::load_from_memory(&response.body).unwrap();
        assert_eq!((image.width(), image.height()), (200, 80));
    }

    #[test]
    fn text_image_needs_text() {
        let response = call(&json_request("/api/text-to-image", r#"{"text":"  "}"#));
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "No text provided");
    }

    #[test]
    fn unbounded_font_sizes_are_client_errors() {
        let response = call(&json_request(
            "/api/text-to-image",
            r#"{"text":"A","width":200,"height":80,"fontSize":200000}"#,
        ));
        assert_eq!(response.status, 400);
        assert!(error_message(&response).starts_with("Font size must be"));

        let response = call(&json_request(
            "/api/placeholder",
            r#"{"width":64,"height":32,"text":"big","fontSize":200000}"#,
        ));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn malformed_json_is_a_client_error() {
        let response = call(&json_request("/api/text-to-image", "{text"));
        assert_eq!(response.status, 400);
        assert!(error_message(&response).starts_with("Invalid JSON body"));
    }

    #[test]
    fn meme_keeps_image_size() {
        let form = FormBuilder::default()
            .file("file", "cat.png", &sample_png(120, 90))
            .text("topText", "top")
            .text("bottomText", "bottom");
        let response = call(&multipart_request("/api/meme", form));
        assert_eq!(response.status, 200);
        let image = image::load_from_memory(&response.body).unwrap();
        assert_eq!((image.width(), image.height()), (120, 90));
    }

    #[test]
    fn placeholder_is_named_after_its_size() {
        let response = call(&json_request(
            "/api/placeholder",
            r#"{"width":64,"height":32,"pattern":"grid","format":"webp"}"#,
        ));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/webp"));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"placeholder-64x32.webp\"")
        );
    }

    #[test]
    fn collage_uses_the_layout_canvas() {
        let form = FormBuilder::default()
            .text("layout", "grid-2")
            .file("files", "a.png", &sample_png(30, 30))
            .file("files", "b.png", &sample_png(30, 60));
        let response = call(&multipart_request("/api/collage", form));
        assert_eq!(response.status, 200);
        let image = image::load_from_memory(&response.body).unwrap();
        assert_eq!((image.width(), image.height()), (800, 400));
    }

    #[test]
    fn icons_as_ico_or_single_png() {
        let form = FormBuilder::default()
            .text("platform", "favicon")
            .file("file", "logo.png", &sample_png(64, 64));
        let response = call(&multipart_request("/api/icons", form));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("image/x-icon"));

        let form = FormBuilder::default()
            .text("size", "48")
            .file("file", "logo.png", &sample_png(64, 64));
        let response = call(&multipart_request("/api/icons", form));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"icon-48.png\"")
        );
        let icon = image::load_from_memory(&response.body).unwrap();
        assert_eq!((icon.width(), icon.height()), (48, 48));
    }

    #[test]
    fn unknown_icon_platform_is_rejected() {
        let form = FormBuilder::default()
            .text("platform", "palm")
            .file("file", "logo.png", &sample_png(64, 64));
        let response = call(&multipart_request("/api/icons", form));
        assert_eq!(response.status, 400);
    }
}
