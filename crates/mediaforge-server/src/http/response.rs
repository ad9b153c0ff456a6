// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP/1.1 responses.

use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::error;

/// A response held entirely in memory; every connection carries one.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Serialise `value` as a JSON body.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header("Content-Type", "application/json")
                .with_body(body),
            Err(err) => {
                error!(error = %err, "response serialisation failed");
                Self::error(500, "Failed to serialise response")
            }
        }
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }

    /// A downloadable file.
    pub fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Self {
        Self::new(200)
            .with_header("Content-Type", content_type)
            .with_header(
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            )
            .with_body(body)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Status line and headers, including `Content-Length` and
    /// `Connection: close`.
    pub fn head(&self) -> String {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");
        head
    }

    /// Write the response; `include_body` is false for `HEAD` requests.
    pub async fn write_to<W>(&self, stream: &mut W, include_body: bool) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(self.head().as_bytes()).await?;
        if include_body {
            stream.write_all(&self.body).await?;
        }
        stream.flush().await
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
