// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Mediaforge.

use thiserror::Error;

/// Top-level error type for all Mediaforge operations.
#[derive(Debug, Error)]
pub enum MediaError {
    // -- Caller errors --
    #[error("{0}")]
    InvalidInput(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid page number. PDF has {page_count} pages")]
    PageOutOfRange { page: u32, page_count: u32 },

    // -- Processing errors --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("code generation failed: {0}")]
    Codec(String),

    #[error("font loading failed: {0}")]
    Font(String),

    #[error("spreadsheet conversion failed: {0}")]
    Spreadsheet(String),

    #[error("feature `{0}` is not enabled in this build")]
    FeatureUnavailable(&'static str),

    // -- Runtime --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whose fault an error is, which decides the HTTP status it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself was wrong; the message is safe to show the caller.
    Client,
    /// The request was fine but the conversion failed.
    Processing,
}

impl MediaError {
    /// Shorthand for an [`MediaError::InvalidInput`] with a static message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Classify the error for the transport layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_) | Self::UnsupportedFormat(_) | Self::PageOutOfRange { .. } => {
                ErrorClass::Client
            }
            _ => ErrorClass::Processing,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_client_class() {
        assert_eq!(MediaError::invalid("No file provided").class(), ErrorClass::Client);
        assert_eq!(
            MediaError::UnsupportedFormat("bmp".into()).class(),
            ErrorClass::Client
        );
        assert_eq!(
            MediaError::PageOutOfRange { page: 9, page_count: 3 }.class(),
            ErrorClass::Client
        );
    }

    #[test]
    fn library_failures_are_processing_class() {
        assert_eq!(MediaError::Pdf("broken xref".into()).class(), ErrorClass::Processing);
        assert_eq!(
            MediaError::FeatureUnavailable("ocr").class(),
            ErrorClass::Processing
        );
        assert_eq!(
            MediaError::Spreadsheet("not a zip archive".into()).class(),
            ErrorClass::Processing
        );
    }

    #[test]
    fn page_out_of_range_message_matches_api_contract() {
        let err = MediaError::PageOutOfRange { page: 7, page_count: 5 };
        assert_eq!(err.to_string(), "Invalid page number. PDF has 5 pages");
    }

    #[test]
    fn invalid_input_message_is_verbatim() {
        assert_eq!(MediaError::invalid("Invalid format").to_string(), "Invalid format");
    }
}
