// Stateless REST surface.
//
// Wraps `reqwest::Client` with bearer-token auth, backend URL
// construction, and error-envelope mapping. Used as the fallback path
// when the socket is not Ready and as the primary path for automation
// config reads/writes the socket surface does not cover.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP client for the backend's stateless REST API.
///
/// All methods return decoded JSON payloads; the `{"message": …}` error
/// envelope is mapped into [`Error`] before the caller sees it. Reads of
/// absent resources return `Ok(None)` rather than an error, so callers
/// can distinguish "not there" from "could not ask".
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Create a new REST client with a long-lived access token.
    pub fn new(
        base_url: Url,
        access_token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", access_token.expose_secret())).map_err(
                |_| Error::Auth {
                    message: "access token contains characters not valid in a header".into(),
                },
            )?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self { http, base_url })
    }

    /// Create a REST client with a pre-built `reqwest::Client`.
    ///
    /// Use this when the auth header is already installed (e.g. in tests).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Reachability probe. Returns the backend's status message.
    pub async fn api_status(&self) -> Result<String, Error> {
        let body: Value = self.get_json(self.api_url("")?).await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned())
    }

    /// List all entity states.
    pub async fn get_states(&self) -> Result<Vec<Value>, Error> {
        self.get_json(self.api_url("states")?).await
    }

    /// Fetch one entity state. Absent entity -> `Ok(None)`.
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<Value>, Error> {
        self.get_optional(self.api_url(&format!("states/{entity_id}"))?)
            .await
    }

    /// Read an automation config payload by its internal id.
    /// Absent config -> `Ok(None)`.
    pub async fn get_automation_config(&self, internal_id: &str) -> Result<Option<Value>, Error> {
        self.get_optional(self.config_url(internal_id)?).await
    }

    /// Create or replace an automation config under the given internal id.
    pub async fn upsert_automation_config(
        &self,
        internal_id: &str,
        payload: &Value,
    ) -> Result<(), Error> {
        let url = self.config_url(internal_id)?;
        debug!(%url, "POST automation config");

        let resp = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Delete an automation config by its internal id.
    pub async fn delete_automation_config(&self, internal_id: &str) -> Result<(), Error> {
        let url = self.config_url(internal_id)?;
        debug!(%url, "DELETE automation config");

        let resp = self.http.delete(url).send().await.map_err(Error::Transport)?;
        Self::check(resp).await?;
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}/api/{path}`.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(&format!("api/{path}"))
            .map_err(Error::InvalidUrl)
    }

    fn config_url(&self, internal_id: &str) -> Result<Url, Error> {
        self.api_url(&format!("config/automation/config/{internal_id}"))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(%url, "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let resp = Self::check(resp).await?;
        Self::decode(resp).await
    }

    /// Like `get_json`, but a 404 becomes `Ok(None)`.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, Error> {
        debug!(%url, "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp).await?;
        Ok(Some(Self::decode(resp).await?))
    }

    /// Map non-success statuses into the error taxonomy, extracting the
    /// `{"message": …}` envelope when present.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
            .unwrap_or(body);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth {
                message: if message.is_empty() {
                    "access token rejected".into()
                } else {
                    message
                },
            }),
            _ => Err(Error::Api {
                message,
                code: None,
                status: Some(status.as_u16()),
            }),
        }
    }

    /// Decode a response body, keeping the raw text for diagnostics.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
