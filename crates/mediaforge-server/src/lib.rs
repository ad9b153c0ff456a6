// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mediaforge-server: HTTP/1.1 front end for the conversion library.
//
// A small tokio TCP server: one request per connection, multipart and JSON
// request bodies, and a static route table mapping each `/api/...` path to a
// synchronous handler that runs on the blocking pool.

pub mod http;
pub mod routes;
pub mod server;
pub mod state;

pub use server::MediaServer;
pub use state::AppState;
