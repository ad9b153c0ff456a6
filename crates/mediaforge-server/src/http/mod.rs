// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP/1.1 framing: request parsing, multipart form decoding and response
// serialisation.

pub mod multipart;
pub mod request;
pub mod response;

use mediaforge_core::MediaError;
use thiserror::Error;

pub use multipart::{Form, Part};
pub use request::{Method, Request, read_request};
pub use response::Response;

/// Transport-level failures, raised before a request reaches its route.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    Malformed(String),

    #[error("Request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The peer closed the connection before sending a full request head.
    #[error("connection closed before the request was complete")]
    Incomplete,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Status code sent back for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::Malformed(_) | Self::Incomplete => 400,
            Self::TooLarge { .. } => 413,
            Self::Io(_) => 500,
        }
    }
}

/// Body decoding errors inside a handler are the caller's fault.
impl From<HttpError> for MediaError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Io(io) => MediaError::Io(io),
            other => MediaError::InvalidInput(other.to_string()),
        }
    }
}

/// Find the first occurrence of `needle` in `haystack`.
pub(crate) fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
