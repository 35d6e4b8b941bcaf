// ── Runtime connection configuration ──
//
// These types describe *how* to reach the backend. They carry the
// credential and connection tuning, but never touch disk or the
// environment -- the embedding tool layer constructs a `BackendConfig`
// and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use hearth_api::ReconnectConfig;
use hearth_api::transport::{TlsMode, TransportConfig};

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// System CA store (strict). Default.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed local backends).
    DangerAcceptInvalid,
}

/// Configuration for connecting to a single backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend base URL (e.g., `http://homeassistant.local:8123`).
    pub url: Url,
    /// Long-lived access token.
    pub access_token: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout, also bounding each socket connection attempt.
    pub timeout: Duration,
    /// Backoff policy for socket reconnection.
    pub reconnect: ReconnectConfig,
}

impl BackendConfig {
    pub fn new(url: Url, access_token: SecretString) -> Self {
        Self {
            url,
            access_token,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Derive the socket endpoint from the base URL:
    /// `http(s)://host` becomes `ws(s)://host/api/websocket`.
    pub fn websocket_url(&self) -> Result<Url, CoreError> {
        let mut ws = self.url.join("api/websocket").map_err(|e| CoreError::Config {
            message: format!("invalid backend URL: {e}"),
        })?;
        let scheme = match self.url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        ws.set_scheme(scheme).map_err(|()| CoreError::Config {
            message: format!("cannot derive a socket scheme from {}", self.url),
        })?;
        Ok(ws)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}
