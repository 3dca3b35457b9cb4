//! Webhook receiver.
//!
//! [`PushTransport`] accepts envelopes the platform POSTs to a single path.
//! Every request is answered only after the sink has finished with the
//! envelope, so a slow dispatcher slows the sender down instead of dropping
//! work.
//!
//! | Request | Status |
//! |---------|--------|
//! | Other method or path | `418`, body left unread |
//! | Secret token mismatch | `401` |
//! | Body over `max_body_bytes` | `413` |
//! | Invalid JSON | `400` |
//! | Dispatched | `200` |
//!
//! The receiver can run its own server ([`PushTransport::create_server`]) or
//! be mounted on an existing axum application ([`PushTransport::router`]).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{PushError, PushResult};
use ferrogram_core::{BoxedSink, Envelope};

/// Header carrying the secret registered with `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Default body limit: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// Configuration
// =============================================================================

/// Certificate and key, both PEM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Webhook receiver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub path: String,
    pub host: String,
    pub port: u16,
    /// Expected value of the secret token header. `None` accepts any request.
    pub secret_token: Option<String>,
    pub max_body_bytes: usize,
    pub tls: Option<TlsConfig>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            path: "/".into(),
            host: "0.0.0.0".into(),
            port: 8443,
            secret_token: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            tls: None,
        }
    }
}

// =============================================================================
// Receiver
// =============================================================================

struct ReceiverState {
    path: RwLock<String>,
    secret_token: RwLock<Option<String>>,
    max_body_bytes: usize,
    sink: BoxedSink,
}

struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Single-path HTTP receiver for pushed updates.
pub struct PushTransport {
    state: Arc<ReceiverState>,
    server: Mutex<Option<ServerHandle>>,
}

impl PushTransport {
    /// Creates a receiver listening on `/` with no secret token.
    pub fn new(sink: BoxedSink) -> Self {
        Self::with_config(sink, &PushConfig::default())
    }

    /// Creates a receiver using the path, secret and body limit of `config`.
    pub fn with_config(sink: BoxedSink, config: &PushConfig) -> Self {
        Self {
            state: Arc::new(ReceiverState {
                path: RwLock::new(normalize_path(&config.path)),
                secret_token: RwLock::new(config.secret_token.clone()),
                max_body_bytes: config.max_body_bytes,
                sink,
            }),
            server: Mutex::new(None),
        }
    }

    pub fn path(&self) -> String {
        self.state.path.read().clone()
    }

    /// Changes the accepted path. A missing leading `/` is added.
    pub fn set_path(&self, path: &str) {
        *self.state.path.write() = normalize_path(path);
    }

    pub fn set_secret_token(&self, token: Option<String>) {
        *self.state.secret_token.write() = token;
    }

    /// An axum router serving this receiver, for mounting on another server.
    ///
    /// The router answers every method and path; requests that do not match
    /// the configured path get `418`.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(receive)
            .with_state(Arc::clone(&self.state))
    }

    /// Binds `host:port` and starts serving `path`.
    ///
    /// Returns the bound address, which differs from `port` when it is `0`.
    /// Fails if a server started by this receiver is still running.
    pub async fn create_server(
        &self,
        path: &str,
        host: &str,
        port: u16,
        tls: Option<&TlsConfig>,
    ) -> PushResult<SocketAddr> {
        let mut server = self.server.lock().await;
        if let Some(running) = server.as_ref() {
            return Err(PushError::AlreadyRunning(running.addr));
        }

        self.set_path(path);
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .map_err(|err| PushError::Bind {
                addr: format!("{host}:{port}"),
                reason: err.to_string(),
            })?;
        let addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = oneshot::channel();

        let task = match tls {
            None => self.serve_plain(listener, shutdown_rx),
            Some(tls) => self.serve_tls(listener, tls, shutdown_rx).await?,
        };

        info!(%addr, path = %self.path(), tls = tls.is_some(), "Webhook server listening");
        *server = Some(ServerHandle {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    fn serve_plain(
        &self,
        listener: tokio::net::TcpListener,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let router = self.router();
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = result {
                error!(error = %err, "Webhook server error");
            }
        })
    }

    #[cfg(feature = "tls")]
    async fn serve_tls(
        &self,
        listener: tokio::net::TcpListener,
        tls: &TlsConfig,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> PushResult<JoinHandle<()>> {
        use axum_server::tls_rustls::RustlsConfig;

        let config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|err| PushError::Tls(err.to_string()))?;
        let listener = listener.into_std()?;
        let handle = axum_server::Handle::new();
        let server = axum_server::from_tcp_rustls(listener, config)
            .handle(handle.clone())
            .serve(self.router().into_make_service());

        tokio::spawn({
            let handle = handle.clone();
            async move {
                let _ = shutdown_rx.await;
                handle.graceful_shutdown(None);
            }
        });

        Ok(tokio::spawn(async move {
            if let Err(err) = server.await {
                error!(error = %err, "Webhook server error");
            }
        }))
    }

    #[cfg(not(feature = "tls"))]
    async fn serve_tls(
        &self,
        _listener: tokio::net::TcpListener,
        _tls: &TlsConfig,
        _shutdown_rx: oneshot::Receiver<()>,
    ) -> PushResult<JoinHandle<()>> {
        Err(PushError::TlsUnavailable)
    }

    /// The address of the running server.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|server| server.addr)
    }

    /// Stops the server and waits for in-flight requests to finish.
    ///
    /// Returns `false` if no server was running.
    pub async fn close(&self) -> bool {
        let Some(server) = self.server.lock().await.take() else {
            return false;
        };

        let _ = server.shutdown.send(());
        if let Err(err) = server.task.await {
            error!(error = %err, "Webhook server task ended abnormally");
        }
        info!(addr = %server.addr, "Webhook server closed");
        true
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

async fn receive(State(state): State<Arc<ReceiverState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let routed = {
        let path = state.path.read();
        parts.method == Method::POST && parts.uri.path() == path.as_str()
    };
    if !routed {
        trace!(method = %parts.method, uri = %parts.uri, "Request not handled");
        return StatusCode::IM_A_TEAPOT.into_response();
    }

    let authorized = {
        let expected = state.secret_token.read();
        match expected.as_deref() {
            None => true,
            Some(expected) => parts
                .headers
                .get(SECRET_TOKEN_HEADER)
                .is_some_and(|value| value.as_bytes() == expected.as_bytes()),
        }
    };
    if !authorized {
        warn!("Rejected webhook request with wrong secret token");
        return (StatusCode::UNAUTHORIZED, "invalid secret token").into_response();
    }

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.max_body_bytes) {
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    read_and_dispatch(&state, body).await
}

async fn read_and_dispatch(state: &ReceiverState, body: Body) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, limit = state.max_body_bytes, "Failed to read webhook body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let envelope = match Envelope::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, len = bytes.len(), "Rejected malformed webhook body");
            return (StatusCode::BAD_REQUEST, "malformed update").into_response();
        }
    };

    trace!(update_id = ?envelope.update_id, len = bytes.len(), "Received webhook update");
    state.sink.process(envelope).await;
    (StatusCode::OK, "ok").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("hook"), "/hook");
        assert_eq!(normalize_path("/hook"), "/hook");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_config_defaults() {
        let config = PushConfig::default();
        assert_eq!(config.path, "/");
        assert_eq!(config.port, 8443);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.tls.is_none());
    }
}
