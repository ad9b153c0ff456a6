// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Base64 / data-URL conversion for images.

use ::base64::Engine;
use ::base64::engine::general_purpose::STANDARD;
use mediaforge_core::{MediaError, Result};
use serde::Serialize;
use tracing::instrument;

/// An image encoded as a `data:` URL plus what the caller needs to show it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub data_url: String,
    pub base64: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Size of the original bytes.
    pub size: usize,
    /// Length of the base64 text.
    pub encoded_size: usize,
}

/// A decoded image with its sniffed format.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Encode image bytes; the bytes must decode as an image.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn encode_image(data: &[u8]) -> Result<EncodedImage> {
    let format = image::guess_format(data)
        .map_err(|_| MediaError::invalid("Uploaded file is not a supported image"))?;
    let decoded = crate::image::processor::decode(data)?;
    let mime_type = format.to_mime_type().to_string();
    let base64 = STANDARD.encode(data);

    Ok(EncodedImage {
        data_url: format!("data:{mime_type};base64,{base64}"),
        encoded_size: base64.len(),
        base64,
        mime_type,
        width: decoded.width(),
        height: decoded.height(),
        size: data.len(),
    })
}

/// Decode base64 text or a `data:` URL into image bytes.
#[instrument(skip(input), fields(input_len = input.len()))]
pub fn decode_image(input: &str) -> Result<DecodedImage> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MediaError::invalid("No data provided"));
    }

    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| MediaError::invalid("Malformed data URL"))?,
        None => trimmed,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| MediaError::invalid("Invalid base64 data"))?;
    let format = image::guess_format(&bytes)
        .map_err(|_| MediaError::invalid("Decoded data is not a supported image"))?;

    Ok(DecodedImage {
        bytes,
        mime_type: format.to_mime_type(),
        extension: format.extensions_str().first().copied().unwrap_or("bin"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::processor::tests::sample_png;

    #[test]
    fn encode_reports_dimensions_and_sizes() {
        let png = sample_png(12, 7);
        let encoded = encode_image(&png).unwrap();
        assert_eq!((encoded.width, encoded.height), (12, 7));
        assert_eq!(encoded.mime_type, "image/png");
        assert!(encoded.data_url.starts_with("data:image/png;base64,"));
        assert_eq!(encoded.size, png.len());
        assert_eq!(encoded.encoded_size, encoded.base64.len());
    }

    #[test]
    fn decode_accepts_data_url_and_bare_base64() {
        let png = sample_png(4, 4);
        let encoded = encode_image(&png).unwrap();

        let from_url = decode_image(&encoded.data_url).unwrap();
        assert_eq!(from_url.bytes, png);
        assert_eq!(from_url.extension, "png");

        let from_bare = decode_image(&encoded.base64).unwrap();
        assert_eq!(from_bare.mime_type, "image/png");
    }

    #[test]
    fn decode_rejects_non_images() {
        let text = STANDARD.encode(b"hello world");
        assert!(matches!(decode_image(&text), Err(MediaError::InvalidInput(_))));
        assert!(matches!(decode_image("!!!"), Err(MediaError::InvalidInput(_))));
        assert!(matches!(decode_image(""), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn encode_rejects_non_images() {
        assert!(encode_image(b"plain text").is_err());
    }
}
