// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document scanning: enhancement of photographed pages and, behind the `ocr`
// feature, text recognition.

pub mod enhance;

#[cfg(feature = "ocr")]
pub mod ocr;

use mediaforge_core::{MediaError, Result};

/// Languages the bundled recognition model can read.
pub const SUPPORTED_LANGUAGES: &[&str] = &["eng"];

/// Resolve the requested OCR language; blank means English.
pub fn check_language(language: Option<&str>) -> Result<&'static str> {
    let requested = language.map(str::trim).filter(|l| !l.is_empty()).unwrap_or("eng");
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|l| *l == requested)
        .ok_or_else(|| MediaError::invalid(format!("Unsupported language: {requested}")))
}
