// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service metadata routes.

use chrono::Utc;
use mediaforge_core::Result;
use serde::Serialize;

use super::ROUTES;
use crate::http::{Request, Response};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    version: &'static str,
    features: Vec<&'static str>,
    started_at: String,
    uptime_seconds: i64,
}

pub fn health(state: &AppState, _request: &Request) -> Result<Response> {
    let started_at = state.started_at();
    Ok(Response::json(
        200,
        &Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            features: AppState::features(),
            started_at: started_at.to_rfc3339(),
            uptime_seconds: (Utc::now() - started_at).num_seconds(),
        },
    ))
}

#[derive(Debug, Serialize)]
struct Tool {
    path: &'static str,
    method: &'static str,
    description: &'static str,
}

pub fn tools(_state: &AppState, _request: &Request) -> Result<Response> {
    let tools: Vec<Tool> = ROUTES
        .iter()
        .map(|route| Tool {
            path: route.path,
            method: route.method,
            description: route.description,
        })
        .collect();
    Ok(Response::json(200, &tools))
}
