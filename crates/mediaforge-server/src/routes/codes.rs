// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR code and barcode routes.

use mediaforge_core::Result;
use mediaforge_document::codes::barcode::render_barcode;
use mediaforge_document::codes::qr::{decode_qr, render_qr};
use mediaforge_document::image::processor::decode;
use mediaforge_document::{BarcodeOptions, QrOptions};
use serde_json::json;
use tracing::instrument;

use super::{encode_png, required_file};
use crate::http::{Request, Response};
use crate::state::AppState;

#[instrument(skip_all)]
pub fn qr_code(_state: &AppState, request: &Request) -> Result<Response> {
    let options: QrOptions = request.json()?;
    let png = encode_png(render_qr(&options)?)?;
    Ok(Response::attachment("image/png", "qrcode.png", png))
}

#[instrument(skip_all)]
pub fn qr_decode(_state: &AppState, request: &Request) -> Result<Response> {
    let form = request.form()?;
    let file = required_file(&form, "file")?;
    let text = decode_qr(&decode(&file.data)?)?;
    Ok(Response::json(200, &json!({ "text": text })))
}

#[instrument(skip_all)]
pub fn barcode(state: &AppState, request: &Request) -> Result<Response> {
    let options: BarcodeOptions = request.json()?;
    let png = encode_png(render_barcode(state.font(), &options)?)?;
    Ok(Response::attachment("image/png", "barcode.png", png))
}
