// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-only state shared by every request.

use chrono::{DateTime, Utc};
use mediaforge_core::ServerConfig;
use mediaforge_document::{FontSource, TextRenderer};
#[cfg(feature = "ocr")]
use mediaforge_document::OcrEngine;
use tracing::info;
#[cfg(feature = "ocr")]
use tracing::warn;

/// Configuration plus the expensive resources loaded once at startup.
pub struct AppState {
    pub config: ServerConfig,
    text: TextRenderer,
    #[cfg(feature = "ocr")]
    ocr: Option<OcrEngine>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let font = FontSource::load(config.font_path.as_deref());
        info!(outline = font.is_outline(), "Text font ready");

        #[cfg(feature = "ocr")]
        let ocr = load_ocr(&config);

        Self {
            text: TextRenderer::new(font),
            #[cfg(feature = "ocr")]
            ocr,
            started_at: Utc::now(),
            config,
        }
    }

    pub fn text(&self) -> &TextRenderer {
        &self.text
    }

    pub fn font(&self) -> &FontSource {
        self.text.font()
    }

    #[cfg(feature = "ocr")]
    pub fn ocr(&self) -> Option<&OcrEngine> {
        self.ocr.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Optional capabilities compiled into this build.
    pub fn features() -> Vec<&'static str> {
        let mut features = Vec::new();
        if cfg!(feature = "ocr") {
            features.push("ocr");
        }
        if cfg!(feature = "render") {
            features.push("render");
        }
        features
    }
}

/// A missing or broken model directory disables OCR instead of failing
/// startup; the route then answers 500.
#[cfg(feature = "ocr")]
fn load_ocr(config: &ServerConfig) -> Option<OcrEngine> {
    let dir = config
        .ocr_model_dir
        .clone()
        .unwrap_or_else(mediaforge_document::scan::ocr::default_model_dir);
    match OcrEngine::load(&dir) {
        Ok(engine) => Some(engine),
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "OCR unavailable");
            None
        }
    }
}
