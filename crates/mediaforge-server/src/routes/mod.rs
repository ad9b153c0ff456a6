// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Route table and the glue shared by every handler.
//
// Handlers are plain synchronous functions from a buffered request to a
// response. Errors they return are classified once, here: caller mistakes
// become 400 with the error's own message, everything else becomes 500 with
// the route's fixed failure message and is logged in full.

pub mod codes;
pub mod compose;
pub mod image;
pub mod meta;
pub mod pdf;
pub mod scan;
pub mod sheet;

use ::image::{DynamicImage, RgbaImage};
use mediaforge_core::{ErrorClass, ImageFormat, MediaError, Result};
use mediaforge_document::ImageProcessor;
use tracing::{error, warn};

use crate::http::{Form, Part, Request, Response};
use crate::state::AppState;

pub type Handler = fn(&AppState, &Request) -> Result<Response>;

/// One API endpoint.
pub struct Route {
    pub path: &'static str,
    /// `GET` or `POST`.
    pub method: &'static str,
    pub handler: Handler,
    /// Body of the 500 response when the handler fails.
    pub failure: &'static str,
    pub description: &'static str,
}

impl Route {
    /// Conversions run on the blocking pool; metadata routes answer inline.
    pub fn is_conversion(&self) -> bool {
        self.method == "POST"
    }

    /// Run the handler and turn its error, if any, into a JSON response.
    pub fn respond(&self, state: &AppState, request: &Request) -> Response {
        match (self.handler)(state, request) {
            Ok(response) => response,
            Err(err) => match err.class() {
                ErrorClass::Client => {
                    warn!(route = self.path, error = %err, "request rejected");
                    Response::error(400, &err.to_string())
                }
                ErrorClass::Processing => {
                    error!(route = self.path, error = %err, "{}", self.failure);
                    Response::error(500, self.failure)
                }
            },
        }
    }
}

pub static ROUTES: &[Route] = &[
    Route {
        path: "/api/health",
        method: "GET",
        handler: meta::health,
        failure: "Health check failed",
        description: "Service status, version and enabled features",
    },
    Route {
        path: "/api/tools",
        method: "GET",
        handler: meta::tools,
        failure: "Failed to list tools",
        description: "Catalogue of the available routes",
    },
    Route {
        path: "/api/convert-image",
        method: "POST",
        handler: image::convert_image,
        failure: "Failed to convert image",
        description: "Convert an image to png, jpg, webp, avif or tiff",
    },
    Route {
        path: "/api/optimize-image",
        method: "POST",
        handler: image::optimize_image,
        failure: "Failed to optimize image",
        description: "Shrink an image by resizing and re-encoding it",
    },
    Route {
        path: "/api/edit-image",
        method: "POST",
        handler: image::edit_image,
        failure: "Failed to edit image",
        description: "Rotate, flip, filter, adjust and watermark an image",
    },
    Route {
        path: "/api/color-palette",
        method: "POST",
        handler: image::color_palette,
        failure: "Failed to extract colors",
        description: "Most frequent colours of an image",
    },
    Route {
        path: "/api/base64",
        method: "POST",
        handler: image::base64,
        failure: "Failed to convert base64 data",
        description: "Encode an image as a data URL or decode one back",
    },
    Route {
        path: "/api/remove-background",
        method: "POST",
        handler: image::remove_background,
        failure: "Failed to remove background",
        description: "Make a uniform backdrop transparent or replace it",
    },
    Route {
        path: "/api/svg-convert",
        method: "POST",
        handler: image::svg_convert,
        failure: "Failed to convert SVG",
        description: "Rasterise an SVG to png, jpg or webp",
    },
    Route {
        path: "/api/image-to-pdf",
        method: "POST",
        handler: pdf::image_to_pdf,
        failure: "Failed to convert images to PDF",
        description: "One A4 page per uploaded image",
    },
    Route {
        path: "/api/pdf-to-image",
        method: "POST",
        handler: pdf::pdf_to_image,
        failure: "Failed to convert PDF to image",
        description: "Render one PDF page as an image",
    },
    Route {
        path: "/api/pdf-tools",
        method: "POST",
        handler: pdf::pdf_tools,
        failure: "Failed to process PDF",
        description: "Merge, split, rotate, number, compress or extract text",
    },
    Route {
        path: "/api/excel-to-pdf",
        method: "POST",
        handler: pdf::excel_to_pdf,
        failure: "Failed to convert Excel to PDF",
        description: "Render an exported HTML table as a landscape PDF",
    },
    Route {
        path: "/api/spreadsheet",
        method: "POST",
        handler: sheet::spreadsheet,
        failure: "Failed to convert spreadsheet",
        description: "CSV to JSON, and workbooks to CSV, JSON or PDF",
    },
    Route {
        path: "/api/scan-document",
        method: "POST",
        handler: scan::scan_document,
        failure: "Failed to process document",
        description: "Clean up a photographed page",
    },
    Route {
        path: "/api/image-to-text",
        method: "POST",
        handler: scan::image_to_text,
        failure: "Failed to extract text from image",
        description: "Recognise the text in an image",
    },
    Route {
        path: "/api/text-to-image",
        method: "POST",
        handler: compose::text_to_image,
        failure: "Failed to convert text to image",
        description: "Render wrapped text onto a canvas",
    },
    Route {
        path: "/api/meme",
        method: "POST",
        handler: compose::meme,
        failure: "Failed to generate meme",
        description: "Add top and bottom captions to an image",
    },
    Route {
        path: "/api/placeholder",
        method: "POST",
        handler: compose::placeholder,
        failure: "Failed to generate placeholder",
        description: "Patterned placeholder image with a label",
    },
    Route {
        path: "/api/collage",
        method: "POST",
        handler: compose::collage,
        failure: "Failed to create collage",
        description: "Arrange several images in a fixed layout",
    },
    Route {
        path: "/api/icons",
        method: "POST",
        handler: compose::icons,
        failure: "Failed to generate icons",
        description: "Favicon and app icon sets",
    },
    Route {
        path: "/api/qr-code",
        method: "POST",
        handler: codes::qr_code,
        failure: "Failed to generate QR code",
        description: "Encode text as a QR code",
    },
    Route {
        path: "/api/qr-decode",
        method: "POST",
        handler: codes::qr_decode,
        failure: "Failed to decode QR code",
        description: "Read the QR code in an image",
    },
    Route {
        path: "/api/barcode",
        method: "POST",
        handler: codes::barcode,
        failure: "Failed to generate barcode",
        description: "Draw a 1D barcode",
    },
];

/// Look up a route by path; a trailing slash is ignored.
pub fn find(path: &str) -> Option<&'static Route> {
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    ROUTES.iter().find(|route| route.path == path)
}

// -- Handler helpers ----------------------------------------------------------

fn required_file<'a>(form: &'a Form, name: &str) -> Result<&'a Part> {
    form.file(name)
        .ok_or_else(|| MediaError::invalid("No file provided"))
}

fn required_files<'a>(form: &'a Form, name: &str) -> Result<Vec<&'a Part>> {
    let files = form.files(name);
    if files.is_empty() {
        return Err(MediaError::invalid("No files provided"));
    }
    Ok(files)
}

/// Resolve a requested output format against the formats a route offers.
/// The lower-cased name is returned too: it goes verbatim into the
/// `Content-Type` and the download name.
fn output_format(requested: Option<&str>, allowed: &[&str]) -> Result<(String, ImageFormat)> {
    let name = requested.unwrap_or_default().trim().to_ascii_lowercase();
    if !allowed.contains(&name.as_str()) {
        return Err(MediaError::invalid("Invalid format"));
    }
    let format = ImageFormat::parse(&name)?;
    Ok((name, format))
}

/// Download name for a converted upload: the upload's own stem when its
/// extension is one of `from`, `fallback` otherwise. Characters that would
/// break the `Content-Disposition` header are dropped.
fn download_name(upload: Option<&str>, from: &[&str], extension: &str, fallback: &str) -> String {
    let stem: String = upload
        .and_then(|name| name.rsplit_once('.'))
        .filter(|(_, ext)| from.iter().any(|f| ext.eq_ignore_ascii_case(f)))
        .map(|(stem, _)| stem.chars().filter(|c| header_safe(*c)).collect())
        .unwrap_or_default();
    let stem = match stem.trim() {
        "" => fallback,
        trimmed => trimmed,
    };
    format!("{stem}.{extension}")
}

fn header_safe(c: char) -> bool {
    (c.is_ascii_graphic() || c == ' ') && !matches!(c, '"' | '\\' | '/')
}

/// Leading integer of `value`, the way `parseInt` reads form fields:
/// `"90deg"` is 90, `"abc"` is `None`.
fn leading_int(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let digits_start = usize::from(value.starts_with(['-', '+']));
    let digits_len = value[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    value[..digits_start + digits_len].parse().ok()
}

fn encode(image: DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    ImageProcessor::from_dynamic(image).encode(format, quality)
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(image)).to_png_bytes()
}
