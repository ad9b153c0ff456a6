// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP conversion server.
//
// One task per TCP connection reads a single buffered request, dispatches it
// through the route table and closes the connection after the response.
// Conversions are CPU bound, so they run on the blocking pool behind a
// semaphore sized by `max_concurrent_jobs`; metadata routes answer inline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use mediaforge_core::{Result, ServerStatus};

use crate::http::{HttpError, Method, Request, Response, read_request};
use crate::routes::{self, Route};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Time allowed for a client to deliver its whole request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const ALLOWED_HEADERS: &str = "Content-Type";

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// State shared by the accept loop and every connection task.
struct Shared {
    state: Arc<AppState>,
    jobs: Semaphore,
    active_connections: Arc<AtomicU32>,
}

pub struct MediaServer {
    state: Arc<AppState>,
    /// Current lifecycle state of the server.
    status: ServerStatus,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the accept loop.
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    /// Address actually bound, known once the server is running.
    local_addr: Option<SocketAddr>,
}

impl MediaServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            local_addr: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the configured address and start accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested. Starting a running server is a no-op.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.status == ServerStatus::Running
            && let Some(addr) = self.local_addr
        {
            debug!(%addr, "server already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;
        let config = &self.state.config;
        let listener = match TcpListener::bind(config.listen_address()).await {
            Ok(listener) => listener,
            Err(err) => {
                self.status = ServerStatus::Stopped;
                error!(address = %config.listen_address(), error = %err, "bind failed");
                return Err(err.into());
            }
        };
        let addr = listener.local_addr()?;
        info!(%addr, jobs = config.max_concurrent_jobs, "mediaforge listening");

        let shared = Arc::new(Shared {
            state: Arc::clone(&self.state),
            jobs: Semaphore::new(config.max_concurrent_jobs),
            active_connections: Arc::clone(&self.active_connections),
        });
        let shutdown = Arc::clone(&self.shutdown_signal);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(addr);
        self.status = ServerStatus::Running;
        Ok(addr)
    }

    /// Stop accepting connections. Requests already being served finish on
    /// their own tasks.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "stopping server");
        self.shutdown_signal.notify_one();
        if let Some(handle) = self.task_handle.take()
            && let Err(err) = handle.await
        {
            warn!(error = %err, "accept loop ended abnormally");
        }

        self.local_addr = None;
        self.status = ServerStatus::Stopped;
        info!("server stopped");
        Ok(())
    }

    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<Shared>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let shared = Arc::clone(&shared);
                            tokio::spawn(async move {
                                shared.active_connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = handle_connection(stream, peer_addr, &shared).await {
                                    warn!(peer = %peer_addr, error = %e, "connection handler error");
                                }
                                shared.active_connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connection handling
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    shared: &Shared,
) -> std::io::Result<()> {
    let request_id = Uuid::new_v4();
    let span = info_span!("request", id = %request_id, peer = %peer_addr);

    async move {
        let mut stream = BufReader::new(stream);
        let max_body = shared.state.config.max_body_bytes;

        let request = match tokio::time::timeout(REQUEST_TIMEOUT, read_request(&mut stream, max_body)).await {
            Ok(Ok(request)) => request,
            Ok(Err(HttpError::Incomplete)) => {
                debug!("client closed before sending a full request");
                return Ok(());
            }
            Ok(Err(HttpError::Io(err))) => return Err(err),
            Ok(Err(err)) => {
                warn!(error = %err, "unreadable request");
                let response = with_cors(Response::error(err.status(), &err.to_string()), shared);
                return response
                    .with_header("X-Request-Id", request_id.to_string())
                    .write_to(stream.get_mut(), true)
                    .await;
            }
            Err(_) => {
                warn!("request timed out");
                return Response::error(408, "Request timed out")
                    .write_to(stream.get_mut(), true)
                    .await;
            }
        };

        debug!(method = request.method.as_str(), path = %request.path, bytes = request.body.len(), "request received");
        let include_body = request.method != Method::Head;
        let response = dispatch(request, shared).await;
        info!(status = response.status, bytes = response.body.len(), "response sent");

        response
            .with_header("X-Request-Id", request_id.to_string())
            .write_to(stream.get_mut(), include_body)
            .await
    }
    .instrument(span)
    .await
}

async fn dispatch(request: Request, shared: &Shared) -> Response {
    let Some(route) = routes::find(&request.path) else {
        return with_cors(Response::error(404, "Not found"), shared);
    };

    let method = request.method.clone();
    let response = match &method {
        Method::Options => Response::no_content().with_header("Allow", allow(route)),
        Method::Get | Method::Head if !route.is_conversion() => {
            route.respond(&shared.state, &request)
        }
        Method::Post if route.is_conversion() => run_conversion(route, request, shared).await,
        method => {
            debug!(method = method.as_str(), route = route.path, "method not allowed");
            Response::error(405, "Method not allowed").with_header("Allow", allow(route))
        }
    };
    with_cors(response, shared)
}

/// Run a conversion on the blocking pool once a job slot is free.
async fn run_conversion(route: &'static Route, request: Request, shared: &Shared) -> Response {
    let Ok(_permit) = shared.jobs.acquire().await else {
        return Response::error(503, "Server is shutting down");
    };

    let state = Arc::clone(&shared.state);
    match tokio::task::spawn_blocking(move || route.respond(&state, &request)).await {
        Ok(response) => response,
        Err(err) => {
            error!(route = route.path, error = %err, "conversion task panicked");
            Response::error(500, route.failure)
        }
    }
}

fn allow(route: &Route) -> String {
    if route.is_conversion() {
        format!("{}, OPTIONS", route.method)
    } else {
        "GET, HEAD, OPTIONS".to_string()
    }
}

fn with_cors(response: Response, shared: &Shared) -> Response {
    match &shared.state.config.cors_allow_origin {
        Some(origin) => response
            .with_header("Access-Control-Allow-Origin", origin.clone())
            .with_header("Access-Control-Allow-Methods", "GET, HEAD, POST, OPTIONS")
            .with_header("Access-Control-Allow-Headers", ALLOWED_HEADERS)
            .with_header(
                "Access-Control-Expose-Headers",
                "Content-Disposition, X-Request-Id, X-Original-Size, X-Optimized-Size",
            ),
        None => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_core::ServerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn running(config: ServerConfig) -> (MediaServer, SocketAddr) {
        let config = ServerConfig {
            port: 0,
            ..config
        };
        let mut server = MediaServer::new(AppState::new(config));
        let addr = server.start().await.unwrap();
        (server, addr)
    }

    /// Send raw bytes and read until the server closes the connection.
    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        String::from_utf8_lossy(&reply).into_owned()
    }

    #[tokio::test]
    async fn health_over_tcp() {
        let (mut server, addr) = running(ServerConfig::default()).await;
        assert_eq!(server.status(), ServerStatus::Running);

        let reply = exchange(addr, b"GET /api/health HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
        assert!(reply.contains("X-Request-Id: "));
        assert!(reply.contains("\"status\":\"ok\""));

        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn head_omits_the_body() {
        let (mut server, addr) = running(ServerConfig::default()).await;
        let reply = exchange(addr, b"HEAD /api/tools HTTP/1.1\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.ends_with("\r\n\r\n"));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (mut server, addr) = running(ServerConfig::default()).await;
        let reply = exchange(addr, b"GET /api/nothing HTTP/1.1\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(reply.contains("{\"error\":\"Not found\"}"));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_allow() {
        let (mut server, addr) = running(ServerConfig::default()).await;
        let reply = exchange(addr, b"GET /api/convert-image HTTP/1.1\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(reply.contains("Allow: POST, OPTIONS\r\n"));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let config = ServerConfig {
            max_body_bytes: 16,
            ..ServerConfig::default()
        };
        let (mut server, addr) = running(config).await;
        let reply = exchange(
            addr,
            b"POST /api/qr-code HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{reply}");
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let config = ServerConfig {
            cors_allow_origin: Some("*".into()),
            ..ServerConfig::default()
        };
        let (mut server, addr) = running(config).await;
        let reply = exchange(addr, b"OPTIONS /api/meme HTTP/1.1\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(reply.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(reply.contains("Allow: POST, OPTIONS\r\n"));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn conversion_round_trip_over_tcp() {
        let (mut server, addr) = running(ServerConfig::default()).await;
        let body = br#"{"text":"hello"}"#;
        let mut raw = format!(
            "POST /api/qr-code HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);

        let reply = exchange(addr, &raw).await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
        assert!(reply.contains("Content-Type: image/png\r\n"));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut server = MediaServer::new(AppState::new(ServerConfig::default()));
        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.active_connections(), 0);
    }
}
