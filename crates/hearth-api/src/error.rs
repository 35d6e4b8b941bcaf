use thiserror::Error;

/// Top-level error type for the `hearth-api` crate.
///
/// Covers every failure mode across both API surfaces: the WebSocket
/// protocol (handshake, correlation, connection lifecycle) and the REST
/// surface. `hearth-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend rejected the access token during the handshake
    /// or on a REST call.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ── Socket lifecycle ────────────────────────────────────────────
    /// WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The auth handshake did not complete as expected
    /// (protocol violation, stream closed mid-handshake).
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A command was issued while the socket was not in the Ready state.
    #[error("Socket is not connected")]
    NotReady,

    /// The connection dropped while a request was in flight.
    #[error("Connection lost while waiting for a response")]
    ConnectionLost,

    /// A caller-supplied deadline elapsed before the correlated
    /// response arrived.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API-level ───────────────────────────────────────────────────
    /// Structured error returned by the backend (socket `result` error
    /// or REST error body).
    #[error("API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::ConnectionLost | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this error indicates the credential was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns `true` if this is a "not found" error from either surface.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status, code, .. } => {
                *status == Some(404) || code.as_deref() == Some("not_found")
            }
            _ => false,
        }
    }

    /// Extract the backend error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
