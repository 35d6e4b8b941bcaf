// ── Core error types ──
//
// User-facing errors from hearth-core. These are NOT wire-specific --
// consumers never see HTTP status codes or frame parse failures
// directly. The `From<hearth_api::Error>` impl translates
// transport-layer errors into domain-appropriate variants.

use serde_json::Value;
use thiserror::Error;

/// One structural problem found while validating a mutation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path of the offending field, e.g. `triggers[1]`.
    pub path: String,
    /// What the schema expected at that path.
    pub expected: &'static str,
    /// What was actually found.
    pub found: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.path, self.expected, self.found
        )
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the backend: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Backend disconnected")]
    Disconnected,

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Identity resolution ──────────────────────────────────────────
    /// The reference matched nothing on any consulted surface.
    #[error("No automation matches {reference:?}: {detail}")]
    NotFound { reference: String, detail: String },

    /// The reference matched more than one candidate, or the surfaces
    /// disagree about which internal id it maps to. Never resolved by
    /// picking a side.
    #[error("Reference {reference:?} is ambiguous ({})", candidates.join(", "))]
    Ambiguous {
        reference: String,
        candidates: Vec<String>,
    },

    // ── Mutation errors ──────────────────────────────────────────────
    /// The payload is structurally malformed. Raised before any
    /// network call.
    #[error("Payload validation failed: {}", issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation { issues: Vec<ValidationIssue> },

    /// The write was applied but the observed state diverges from the
    /// requested state -- or could not be confirmed at all
    /// (`observed: None`). Reported, never silently retried.
    #[error("Write verification failed: {detail}")]
    Verification {
        expected: Value,
        observed: Option<Value>,
        detail: String,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hearth_api::Error> for CoreError {
    fn from(err: hearth_api::Error) -> Self {
        match err {
            hearth_api::Error::Auth { message } => CoreError::AuthenticationFailed { message },
            hearth_api::Error::NotReady | hearth_api::Error::ConnectionLost => {
                CoreError::Disconnected
            }
            hearth_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            hearth_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            hearth_api::Error::WebSocketConnect(reason) | hearth_api::Error::Handshake(reason) => {
                CoreError::ConnectionFailed { reason }
            }
            hearth_api::Error::Tls(reason) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {reason}"),
            },
            hearth_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            hearth_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status,
            },
            hearth_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
