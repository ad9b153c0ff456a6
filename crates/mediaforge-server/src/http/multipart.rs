// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `multipart/form-data` decoding (RFC 7578) over a fully buffered body.

use std::str::FromStr;

use super::{HttpError, find_subsequence};

/// One field of a form.
#[derive(Debug, Clone, Default)]
pub struct Part {
    pub name: String,
    /// Set for file uploads.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    /// The part's value as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// A decoded form, parts in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Form {
    parts: Vec<Part>,
}

impl Form {
    pub fn parse(body: &[u8], boundary: &str) -> Result<Self, HttpError> {
        let delimiter = format!("--{boundary}");
        let delimiter = delimiter.as_bytes();
        let next_delimiter = format!("\r\n--{boundary}");
        let next_delimiter = next_delimiter.as_bytes();

        let start = find_subsequence(body, delimiter)
            .ok_or_else(|| HttpError::malformed("Multipart body has no boundary"))?;
        let mut rest = &body[start + delimiter.len()..];
        let mut parts = Vec::new();

        loop {
            if rest.starts_with(b"--") {
                break;
            }
            rest = rest
                .strip_prefix(b"\r\n")
                .ok_or_else(|| HttpError::malformed("Malformed multipart boundary line"))?;

            let header_end = find_subsequence(rest, b"\r\n\r\n")
                .ok_or_else(|| HttpError::malformed("Unterminated multipart headers"))?;
            let (head, content) = (&rest[..header_end], &rest[header_end + 4..]);

            let end = find_subsequence(content, next_delimiter)
                .ok_or_else(|| HttpError::malformed("Unterminated multipart body"))?;
            let mut part = parse_part_headers(head)?;
            part.data = content[..end].to_vec();
            parts.push(part);

            rest = &content[end + next_delimiter.len()..];
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Trimmed, non-empty text value of the first field called `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .filter(|part| part.name == name)
            .find_map(Part::text)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Parse the text value of `name`; absent or unparsable values are `None`.
    pub fn value<T: FromStr>(&self, name: &str) -> Option<T> {
        self.text(name).and_then(|value| value.parse().ok())
    }

    /// `true` only for the literal value `true`, the way HTML checkbox
    /// handlers send it.
    pub fn flag(&self, name: &str) -> bool {
        self.text(name)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    /// First non-empty upload called `name`.
    pub fn file(&self, name: &str) -> Option<&Part> {
        self.files(name).into_iter().next()
    }

    /// Every non-empty upload called `name` (or `name[]`), in order.
    pub fn files(&self, name: &str) -> Vec<&Part> {
        let array_name = format!("{name}[]");
        self.parts
            .iter()
            .filter(|part| part.name == name || part.name == array_name)
            .filter(|part| part.filename.is_some() && !part.data.is_empty())
            .collect()
    }
}

fn parse_part_headers(head: &[u8]) -> Result<Part, HttpError> {
    let head = std::str::from_utf8(head)
        .map_err(|_| HttpError::malformed("Multipart headers are not valid UTF-8"))?;
    let mut part = Part::default();
    let mut has_disposition = false;

    for line in head.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-disposition") {
            has_disposition = true;
            for (key, param) in header_params(value) {
                match key.as_str() {
                    "name" => part.name = param,
                    "filename" => part.filename = Some(param),
                    _ => {}
                }
            }
        } else if name.trim().eq_ignore_ascii_case("content-type") {
            part.content_type = Some(value.trim().to_string());
        }
    }

    if !has_disposition {
        return Err(HttpError::malformed("Multipart part has no Content-Disposition"));
    }
    Ok(part)
}

/// `key=value` parameters of a header value, skipping the leading token.
/// Quoted values may contain `;`.
fn header_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = match value.split_once(';') {
        Some((_, rest)) => rest,
        None => return params,
    };

    loop {
        rest = rest.trim_start_matches([' ', '\t', ';']);
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().to_ascii_lowercase();
        rest = &rest[eq + 1..];

        let param = if let Some(quoted) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = quoted.char_indices();
            let mut consumed = quoted.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    '"' => {
                        consumed = i + 1;
                        break;
                    }
                    _ => out.push(c),
                }
            }
            rest = &quoted[consumed..];
            out
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            let token = rest[..end].trim().to_string();
            rest = &rest[end..];
            token
        };
        params.push((key, param));
    }

    params
}

/// Boundary parameter of a `multipart/form-data` content type.
pub fn boundary(content_type: &str) -> Option<String> {
    let (mime, _) = content_type.split_once(';').unwrap_or((content_type, ""));
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    header_params(content_type)
        .into_iter()
        .find(|(key, _)| key == "boundary")
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
