// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR for the image-to-text route, using the pure-Rust `ocrs` engine with
// models executed by `rten`.
//
// # Feature Gate
//
// Only compiled with the `ocr` feature:
//
// ```toml
// mediaforge-document = { path = "crates/mediaforge-document", features = ["ocr"] }
// ```
//
// # Models
//
// The engine needs `text-detection.rten` and `text-recognition.rten` in one
// directory (`ocr_model_dir` in the server config). Running `ocrs-cli` once
// downloads both into `~/.cache/ocrs`, which is also the fallback location.
//
// `ocrs` and `rten` are extremely slow in debug builds; run the server with
// `--release`.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use mediaforge_core::{MediaError, Result};
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use serde::Serialize;
use tracing::{debug, info, instrument};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Response body of the image-to-text route.
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    pub text: String,
    /// Percentage (0..=100) of detected text lines that produced text.
    pub confidence: f32,
    pub language: String,
}

/// Loaded OCR models, shared read-only between requests.
pub struct OcrEngine {
    engine: OcrsEngine,
}

impl OcrEngine {
    /// Load both models from `dir`.
    ///
    /// Model loading is the expensive step; build one engine at startup.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load(dir: &Path) -> Result<Self> {
        let detection_path = dir.join(DETECTION_MODEL_FILENAME);
        let recognition_path = dir.join(RECOGNITION_MODEL_FILENAME);
        for path in [&detection_path, &recognition_path] {
            if !path.exists() {
                return Err(MediaError::Ocr(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&detection_path).map_err(|err| {
            MediaError::Ocr(format!(
                "failed to load detection model from {}: {err}",
                detection_path.display()
            ))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model = Model::load_file(&recognition_path).map_err(|err| {
            MediaError::Ocr(format!(
                "failed to load recognition model from {}: {err}",
                recognition_path.display()
            ))
        })?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| MediaError::Ocr(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }

    /// Recognise the text of `image`. `language` must already have passed
    /// [`check_language`](super::check_language).
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn recognize(&self, image: &DynamicImage, language: &str) -> Result<OcrResult> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            MediaError::Ocr(format!("failed to create image source ({width}x{height}): {err}"))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| MediaError::Ocr(format!("OCR preprocessing failed: {err}")))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|err| MediaError::Ocr(format!("word detection failed: {err}")))?;
        let line_rects = self.engine.find_text_lines(&input, &words);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| MediaError::Ocr(format!("line recognition failed: {err}")))?;

        let texts: Vec<String> = lines
            .iter()
            .flatten()
            .map(|line| line.to_string())
            .filter(|text| !text.trim().is_empty())
            .collect();
        let confidence = line_confidence(texts.len(), line_rects.len());
        debug!(detected = line_rects.len(), recognised = texts.len(), confidence, "OCR complete");

        Ok(OcrResult {
            text: texts.join("\n"),
            confidence,
            language: language.to_string(),
        })
    }
}

fn line_confidence(recognised: usize, detected: usize) -> f32 {
    if detected == 0 {
        return 0.0;
    }
    (recognised as f32 / detected as f32 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_are_reported() {
        let dir = std::env::temp_dir().join("mediaforge-no-such-models");
        let err = OcrEngine::load(&dir).err().expect("load should fail");
        assert!(err.to_string().contains(DETECTION_MODEL_FILENAME));
    }

    #[test]
    fn confidence_is_share_of_lines() {
        assert_eq!(line_confidence(0, 0), 0.0);
        assert_eq!(line_confidence(3, 4), 75.0);
        assert_eq!(line_confidence(4, 4), 100.0);
    }

    #[test]
    fn default_dir_ends_in_ocrs() {
        assert!(default_model_dir().ends_with("ocrs") || default_model_dir().ends_with("ocrs-models"));
    }
}
