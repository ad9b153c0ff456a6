// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP/1.1 request reading.
//
// Only what browsers and `curl` send to an upload endpoint is handled: a
// request line, headers, and a body framed by Content-Length or chunked
// transfer encoding. `Expect: 100-continue` is answered so large uploads do
// not stall.

use std::io::ErrorKind;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::HttpError;
use super::multipart::{self, Form};

/// Upper bound for the request line plus all headers.
const MAX_HEAD_BYTES: usize = 16 * 1024;
const MAX_HEADERS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Options,
    Other(String),
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Options => "OPTIONS",
            Self::Other(token) => token,
        }
    }
}

/// A fully buffered request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub query: Option<String>,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request from a method and request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Decode a `multipart/form-data` body. An empty body is an empty form,
    /// so routes report the missing field rather than the framing.
    pub fn form(&self) -> Result<Form, HttpError> {
        if self.body.is_empty() {
            return Ok(Form::default());
        }
        let boundary = self
            .content_type()
            .and_then(multipart::boundary)
            .ok_or_else(|| HttpError::malformed("Expected a multipart/form-data body"))?;
        Form::parse(&self.body, &boundary)
    }

    /// Decode a JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| HttpError::malformed(format!("Invalid JSON body: {err}")))
    }
}

/// Read one request from `stream`. Bodies larger than `max_body` are
/// refused with [`HttpError::TooLarge`] before they are read.
pub async fn read_request<S>(stream: &mut S, max_body: usize) -> Result<Request, HttpError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let mut budget = MAX_HEAD_BYTES;

    // Tolerate stray CRLFs before the request line.
    let request_line = loop {
        match read_line(stream, &mut budget).await? {
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
            None => return Err(HttpError::Incomplete),
        }
    };

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::malformed("Malformed request line"));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::malformed(format!("Unsupported protocol: {version}")));
    }
    let mut request = Request::new(Method::parse(method), target);

    loop {
        let line = read_line(stream, &mut budget)
            .await?
            .ok_or(HttpError::Incomplete)?;
        if line.is_empty() {
            break;
        }
        if request.headers.len() >= MAX_HEADERS {
            return Err(HttpError::malformed("Too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::malformed("Malformed header line"))?;
        request
            .headers
            .push((name.trim().to_string(), value.trim().to_string()));
    }

    let chunked = request
        .header("transfer-encoding")
        .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"));
    let content_length = match request.header("content-length") {
        Some(value) => Some(
            value
                .parse::<usize>()
                .map_err(|_| HttpError::malformed("Invalid Content-Length"))?,
        ),
        None => None,
    };

    if chunked {
        send_continue(stream, &request).await?;
        request.body = read_chunked(stream, max_body).await?;
    } else if let Some(length) = content_length {
        if length > max_body {
            return Err(HttpError::TooLarge { limit: max_body });
        }
        send_continue(stream, &request).await?;
        let mut body = vec![0; length];
        stream.read_exact(&mut body).await.map_err(eof_as_incomplete)?;
        request.body = body;
    }

    debug!(
        method = request.method.as_str(),
        path = %request.path,
        body_len = request.body.len(),
        "request read"
    );
    Ok(request)
}

/// Answer `Expect: 100-continue` once the body is known to be acceptable.
async fn send_continue<S>(stream: &mut S, request: &Request) -> Result<(), HttpError>
where
    S: AsyncWrite + Unpin,
{
    let expects_continue = request
        .header("expect")
        .is_some_and(|value| value.eq_ignore_ascii_case("100-continue"));
    if expects_continue {
        stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        stream.flush().await?;
    }
    Ok(())
}

async fn read_chunked<S>(stream: &mut S, max_body: usize) -> Result<Vec<u8>, HttpError>
where
    S: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let mut budget = MAX_HEAD_BYTES;
        let line = read_line(stream, &mut budget)
            .await?
            .ok_or(HttpError::Incomplete)?;
        let size_field = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| HttpError::malformed("Invalid chunk size"))?;

        if size == 0 {
            // Trailer fields are read and discarded.
            loop {
                let trailer = read_line(stream, &mut budget)
                    .await?
                    .ok_or(HttpError::Incomplete)?;
                if trailer.is_empty() {
                    return Ok(body);
                }
            }
        }

        if body.len().saturating_add(size) > max_body {
            return Err(HttpError::TooLarge { limit: max_body });
        }
        let start = body.len();
        body.resize(start + size, 0);
        stream
            .read_exact(&mut body[start..])
            .await
            .map_err(eof_as_incomplete)?;

        let terminator = read_line(stream, &mut budget)
            .await?
            .ok_or(HttpError::Incomplete)?;
        if !terminator.is_empty() {
            return Err(HttpError::malformed("Missing chunk terminator"));
        }
    }
}

/// Read one CRLF- (or LF-) terminated line, charging it against `budget`.
/// `None` means the stream ended cleanly before the line started.
async fn read_line<S>(stream: &mut S, budget: &mut usize) -> Result<Option<String>, HttpError>
where
    S: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *stream)
        .take(*budget as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if read > *budget {
        return Err(HttpError::malformed("Request head too large"));
    }
    *budget -= read;
    if !buf.ends_with(b"\n") {
        return Err(HttpError::Incomplete);
    }
    buf.pop();
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| HttpError::malformed("Request head is not valid UTF-8"))
}

fn eof_as_incomplete(err: std::io::Error) -> HttpError {
    if err.kind() == ErrorKind::UnexpectedEof {
        HttpError::Incomplete
    } else {
        HttpError::Io(err)
    }
}
