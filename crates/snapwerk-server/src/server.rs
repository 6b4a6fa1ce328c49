// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP front end for the image pipeline.
//
// The server listens on a configurable address (default 0.0.0.0:5005) and
// serves one request per TCP connection. Image work runs on tokio's blocking
// pool so the accept loop never stalls behind a large batch.
//
// # Routes
//
//   POST /process-images   multipart files → zip of processed JPEGs
//   POST /process-image    multipart `image` field → one processed JPEG,
//                          also retained as a snapshot on disk
//   GET  /health           liveness check
//
// Both processing routes take an optional `actions` query parameter
// (comma-separated, e.g. `?actions=gray,clahe,faces`); without it the
// configured default list applies.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::json;
use snapwerk_core::error::{Result, SnapwerkError};
use snapwerk_core::human_errors::humanize_error;
use snapwerk_core::{ActionList, AppConfig, RequestId, ServerStatus};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::batch::{BatchOrchestrator, Upload};
use crate::http::{self, HttpRequest, HttpResponse};
use crate::multipart::{self, FormPart};
use crate::snapshot::SnapshotStore;

/// Form field carrying the upload for the single-image route.
const SINGLE_IMAGE_FIELD: &str = "image";

/// Query parameter selecting the action list.
const ACTIONS_PARAM: &str = "actions";

// ---------------------------------------------------------------------------
// Shared state passed to connection handlers
// ---------------------------------------------------------------------------

/// State shared across all connection-handling tasks. Immutable apart from
/// the connection counter.
struct SharedState {
    orchestrator: BatchOrchestrator,
    snapshots: SnapshotStore,
    default_actions: ActionList,
    max_request_bytes: usize,
    active_connections: Arc<AtomicU32>,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The Snapwerk HTTP server.
pub struct Server {
    /// Address to bind; port 0 picks an ephemeral port.
    bind_addr: SocketAddr,
    /// Address actually bound, once running.
    local_addr: Option<SocketAddr>,
    status: ServerStatus,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the accept loop.
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    state: Arc<SharedState>,
}

impl Server {
    /// Create a stopped server from `config`. Call [`start`](Self::start) to
    /// begin accepting connections.
    pub fn new(config: &AppConfig, orchestrator: BatchOrchestrator) -> Result<Self> {
        let ip: IpAddr = config.bind_address.parse().map_err(|e| {
            SnapwerkError::Config(format!("bind_address {:?}: {e}", config.bind_address))
        })?;
        let active_connections = Arc::new(AtomicU32::new(0));

        let state = Arc::new(SharedState {
            orchestrator,
            snapshots: SnapshotStore::new(&config.output_dir, config.snapshot_keep),
            default_actions: config.default_action_list(),
            max_request_bytes: config.max_request_bytes,
            active_connections: Arc::clone(&active_connections),
        });

        Ok(Self {
            bind_addr: SocketAddr::new(ip, config.port),
            local_addr: None,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections,
            state,
        })
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Return the number of currently active client connections.
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener and spawn the accept loop. Returns the bound
    /// address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "server already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;

        let listener = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                return Err(SnapwerkError::Server(format!("bind {}: {e}", self.bind_addr)));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| SnapwerkError::Server(format!("local address: {e}")))?;

        info!(
            addr = %local_addr,
            locator = self.state.orchestrator.pipeline().locator_name(),
            default_actions = %self.state.default_actions,
            snapshots = %self.state.snapshots.root().display(),
            keep = self.state.snapshots.keep(),
            "Snapwerk server listening"
        );

        let shutdown = Arc::clone(&self.shutdown_signal);
        let shared = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(local_addr);
        self.status = ServerStatus::Running;
        Ok(local_addr)
    }

    /// Gracefully stop the server.
    ///
    /// Signals the accept loop to exit and awaits its completion. Requests
    /// already being handled run to completion on their own tasks.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "stopping server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| SnapwerkError::Server(format!("task join: {e}")))?;
        }

        self.local_addr = None;
        self.status = ServerStatus::Stopped;
        info!("server stopped");
        Ok(())
    }

    /// The main accept loop.
    ///
    /// Runs until the shutdown signal is received. Each incoming connection
    /// is handed off to [`handle_connection`](Self::handle_connection) in a
    /// separate task.
    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let state = Arc::clone(&shared);
                            let request_id = RequestId::new();
                            let span = info_span!("request", id = %request_id, peer = %peer_addr);
                            tokio::spawn(
                                async move {
                                    state.active_connections.fetch_add(1, Ordering::Relaxed);
                                    if let Err(e) = Self::handle_connection(stream, Arc::clone(&state)).await {
                                        warn!(error = %e, "connection handler error");
                                    }
                                    state.active_connections.fetch_sub(1, Ordering::Relaxed);
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Read one request, route it, write the response, close.
    async fn handle_connection(mut stream: TcpStream, state: Arc<SharedState>) -> Result<()> {
        let request = match http::read_request(&mut stream, state.max_request_bytes).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("empty connection closed");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "unreadable request");
                let response = HttpResponse::from_error(&e);
                http::write_response(&mut stream, &response).await?;
                let _ = stream.shutdown().await;
                return Ok(());
            }
        };

        let method = request.method.clone();
        let path = request.path.clone();
        let response = route(request, Arc::clone(&state)).await;

        http::write_response(&mut stream, &response).await?;
        let _ = stream.shutdown().await;

        info!(
            %method,
            %path,
            status = response.status,
            bytes = response.body.len(),
            "response sent"
        );
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

async fn route(request: HttpRequest, state: Arc<SharedState>) -> HttpResponse {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => HttpResponse::json(200, &json!({ "status": "ok" })),
        ("POST", "/process-images") => process_images(request, state).await,
        ("POST", "/process-image") => process_image(request, state).await,
        (_, "/health") => method_not_allowed("GET"),
        (_, "/process-images" | "/process-image") => method_not_allowed("POST"),
        (_, path) => HttpResponse::error(
            404,
            &format!("No route for {path}."),
            "Use POST /process-images, POST /process-image or GET /health.",
        ),
    }
}

fn method_not_allowed(allow: &str) -> HttpResponse {
    HttpResponse::error(
        405,
        "Method not allowed for this path.",
        &format!("Use {allow}."),
    )
    .with_header("Allow", allow)
}

/// `POST /process-images`: every file part goes through the pipeline; the
/// survivors come back as a zip.
async fn process_images(request: HttpRequest, state: Arc<SharedState>) -> HttpResponse {
    let actions = requested_actions(&request, &state);
    let uploads: Vec<Upload> = match form_parts(request).await {
        Ok(parts) => parts
            .into_iter()
            .filter(FormPart::is_file)
            .map(|part| Upload::new(part.filename.unwrap_or_default(), part.data))
            .collect(),
        Err(e) => return HttpResponse::from_error(&e),
    };
    if uploads.is_empty() {
        return HttpResponse::from_error(&SnapwerkError::InvalidRequest(
            "No image files in request".into(),
        ));
    }

    info!(uploads = uploads.len(), actions = %actions, "batch request");
    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker_state
            .orchestrator
            .process_to_archive(uploads, &actions)
    })
    .await;

    match flatten(result) {
        Ok(archive) => HttpResponse::new(200, "application/zip", archive)
            .with_header("Content-Disposition", "attachment; filename=\"processed_images.zip\""),
        Err(e) => {
            warn!(error = %e, "batch request failed");
            HttpResponse::from_error(&e)
        }
    }
}

/// `POST /process-image`: the `image` part goes through the pipeline; the
/// result is returned and kept as a snapshot.
async fn process_image(request: HttpRequest, state: Arc<SharedState>) -> HttpResponse {
    let actions = requested_actions(&request, &state);
    let part = match form_parts(request).await {
        Ok(parts) => parts
            .into_iter()
            .find(|part| part.is_file() && part.name.as_deref() == Some(SINGLE_IMAGE_FIELD)),
        Err(e) => return HttpResponse::from_error(&e),
    };
    let Some(part) = part else {
        return HttpResponse::error(
            400,
            "No image part in request",
            "Attach the file as a multipart field named `image`.",
        );
    };

    info!(filename = ?part.filename, bytes = part.data.len(), actions = %actions, "single image request");
    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let jpeg = worker_state.orchestrator.process_one(&part.data, &actions)?;
        if let Err(e) = worker_state.snapshots.save(&jpeg) {
            warn!(error = %e, "snapshot not retained");
        }
        Ok(jpeg)
    })
    .await;

    match flatten(result) {
        Ok(jpeg) => HttpResponse::new(200, "image/jpeg", jpeg),
        Err(SnapwerkError::Server(detail)) => {
            error!(%detail, "image worker failed");
            HttpResponse::from_error(&SnapwerkError::Server(detail))
        }
        Err(e) => {
            // The only image failed; report it as unprocessable whatever the
            // stage.
            warn!(error = %e, "single image failed");
            let human = humanize_error(&e);
            HttpResponse::error(422, &human.message, &human.suggestion)
        }
    }
}

fn requested_actions(request: &HttpRequest, state: &SharedState) -> ActionList {
    match request.query_param(ACTIONS_PARAM) {
        Some(text) => ActionList::parse(text),
        None => state.default_actions.clone(),
    }
}

async fn form_parts(request: HttpRequest) -> Result<Vec<FormPart>> {
    let content_type = request.header("content-type").ok_or_else(|| {
        SnapwerkError::InvalidRequest("missing Content-Type; expected multipart/form-data".into())
    })?;
    let boundary = multipart::boundary_from_content_type(content_type)?;
    multipart::parse_multipart(request.body, &boundary).await
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(|e| SnapwerkError::Server(format!("worker task: {e}")))?
}
