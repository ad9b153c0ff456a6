// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTML scanning for spreadsheet exports: pull the cells out of the
// first `<table>`, or flatten the whole document to text when there is none.
//
// This is a tag scanner, not an HTML parser. It understands start and end
// tags, comments, and character references, which is all a generated table
// export contains.

use tracing::debug;

/// A lexical piece of an HTML document.
#[derive(Debug, PartialEq)]
enum Token<'a> {
    /// Start tag, lower-cased name.
    Open(String),
    /// End tag, lower-cased name.
    Close(String),
    Text(&'a str),
}

/// Split `html` into tags and text. Comments, doctypes and processing
/// instructions are skipped.
fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(rest));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(&rest[..lt]));
        }
        rest = &rest[lt..];

        if let Some(comment) = rest.strip_prefix("<!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }

        let Some(gt) = rest.find('>') else {
            // Unterminated tag: treat the remainder as text.
            tokens.push(Token::Text(rest));
            break;
        };
        let inner = &rest[1..gt];
        rest = &rest[gt + 1..];

        if inner.starts_with('!') || inner.starts_with('?') {
            continue;
        }
        let (closing, body) = match inner.strip_prefix('/') {
            Some(body) => (true, body),
            None => (false, inner),
        };
        let name: String = body
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if name.is_empty() {
            tokens.push(Token::Text("<"));
            continue;
        }
        tokens.push(if closing {
            Token::Close(name)
        } else {
            Token::Open(name)
        });
    }

    tokens
}

/// Rows of the first `<table>` in `html`, each a list of `<td>`/`<th>` cell
/// texts. `None` when the document has no table.
pub fn extract_table(html: &str) -> Option<Vec<Vec<String>>> {
    let tokens = tokenize(html);
    let start = tokens
        .iter()
        .position(|t| matches!(t, Token::Open(name) if name == "table"))?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<String> = None;
    let mut depth = 0usize;

    for token in &tokens[start..] {
        match token {
            Token::Open(name) => match name.as_str() {
                "table" => depth += 1,
                "tr" => {
                    close_cell(&mut cell, &mut row);
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                    row = Some(Vec::new());
                }
                "td" | "th" => {
                    close_cell(&mut cell, &mut row);
                    row.get_or_insert_with(Vec::new);
                    cell = Some(String::new());
                }
                "br" | "p" | "div" => {
                    if let Some(text) = cell.as_mut() {
                        text.push(' ');
                    }
                }
                _ => {}
            },
            Token::Close(name) => match name.as_str() {
                "td" | "th" => close_cell(&mut cell, &mut row),
                "tr" => {
                    close_cell(&mut cell, &mut row);
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                "table" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            },
            Token::Text(text) => {
                if let Some(buffer) = cell.as_mut() {
                    buffer.push_str(text);
                }
            }
        }
    }
    close_cell(&mut cell, &mut row);
    if let Some(done) = row.take() {
        rows.push(done);
    }

    debug!(rows = rows.len(), "HTML table extracted");
    Some(rows)
}

fn close_cell(cell: &mut Option<String>, row: &mut Option<Vec<String>>) {
    if let Some(raw) = cell.take() {
        row.get_or_insert_with(Vec::new).push(clean_text(&raw));
    }
}

/// Visible text of `html` with tags removed and `<script>`/`<style>` bodies
/// dropped.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut hidden: Option<String> = None;

    for token in tokenize(html) {
        match token {
            Token::Open(name) if hidden.is_none() && (name == "script" || name == "style") => {
                hidden = Some(name);
            }
            Token::Close(name) if hidden.as_deref() == Some(name.as_str()) => hidden = None,
            Token::Open(_) | Token::Close(_) => out.push(' '),
            Token::Text(text) if hidden.is_none() => out.push_str(text),
            Token::Text(_) => {}
        }
    }

    clean_text(&out)
}

/// Decode character references and collapse runs of whitespace.
fn clean_text(raw: &str) -> String {
    decode_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
