// ── Backend seam ──
//
// One trait abstracts over the two wire surfaces so the resolver,
// coordinator, and join engine receive an explicitly constructed
// backend via their constructors -- no global client, no runtime
// capability probing. `LiveBackend` picks the surface per call: the
// socket when Ready, the stateless surface otherwise. The two surfaces
// are never used concurrently for the same write.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use hearth_api::socket::Command;
use hearth_api::{RestClient, SocketClient, SocketConfig};

use crate::config::BackendConfig;
use crate::error::CoreError;
use crate::model::{AreaRecord, CategoryRecord, DeviceRecord, EntityRecord, EntityState, LabelRecord};

/// Everything the core layer needs from the backend.
///
/// Registry listings are only served by the socket surface; states and
/// automation config reads/writes have a stateless fallback.
pub trait Backend: Send + Sync {
    fn entity_registry(&self) -> impl Future<Output = Result<Vec<EntityRecord>, CoreError>> + Send;
    fn device_registry(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, CoreError>> + Send;
    fn area_registry(&self) -> impl Future<Output = Result<Vec<AreaRecord>, CoreError>> + Send;
    fn label_registry(&self) -> impl Future<Output = Result<Vec<LabelRecord>, CoreError>> + Send;
    fn category_registry(
        &self,
        scope: &str,
    ) -> impl Future<Output = Result<Vec<CategoryRecord>, CoreError>> + Send;

    fn states(&self) -> impl Future<Output = Result<Vec<EntityState>, CoreError>> + Send;

    /// Read an automation config payload. Absent -> `Ok(None)`.
    fn automation_config(
        &self,
        internal_id: &str,
    ) -> impl Future<Output = Result<Option<Value>, CoreError>> + Send;

    /// Create or replace an automation config.
    fn write_automation_config(
        &self,
        internal_id: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Delete an automation config.
    fn delete_automation_config(
        &self,
        internal_id: &str,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

// ── LiveBackend ─────────────────────────────────────────────────────

/// The production backend: one socket client plus one REST client.
pub struct LiveBackend {
    socket: SocketClient,
    rest: RestClient,
}

impl LiveBackend {
    pub fn new(socket: SocketClient, rest: RestClient) -> Self {
        Self { socket, rest }
    }

    /// Build both surfaces from configuration and connect the socket.
    ///
    /// A rejected credential is fatal -- it would be rejected by both
    /// surfaces. A transport failure is not: the stateless surface
    /// still serves reads and writes, so the backend comes up degraded
    /// rather than not at all.
    pub async fn connect(config: &BackendConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let rest = RestClient::new(config.url.clone(), &config.access_token, &transport)?;

        let socket_config = SocketConfig {
            url: config.websocket_url()?,
            access_token: config.access_token.clone(),
            connect_timeout: config.timeout,
            reconnect: config.reconnect.clone(),
        };
        let socket = SocketClient::new(socket_config);

        match socket.connect().await {
            Ok(()) => {}
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "socket unavailable, stateless surface only");
            }
        }

        Ok(Self { socket, rest })
    }

    pub fn socket(&self) -> &SocketClient {
        &self.socket
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Shut the socket down and release the transport.
    pub async fn disconnect(&self) {
        self.socket.disconnect().await;
    }

    async fn registry_list<T: DeserializeOwned>(
        &self,
        command: Command,
        what: &'static str,
    ) -> Result<Vec<T>, CoreError> {
        if !self.socket.is_connected() {
            debug!(what, "registry listing requested while socket not ready");
            return Err(CoreError::Disconnected);
        }
        let raw = self.socket.send(command).await?;
        decode_list(raw, what)
    }
}

impl Backend for LiveBackend {
    async fn entity_registry(&self) -> Result<Vec<EntityRecord>, CoreError> {
        self.registry_list(Command::new("config/entity_registry/list"), "entity registry")
            .await
    }

    async fn device_registry(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        self.registry_list(Command::new("config/device_registry/list"), "device registry")
            .await
    }

    async fn area_registry(&self) -> Result<Vec<AreaRecord>, CoreError> {
        self.registry_list(Command::new("config/area_registry/list"), "area registry")
            .await
    }

    async fn label_registry(&self) -> Result<Vec<LabelRecord>, CoreError> {
        self.registry_list(Command::new("config/label_registry/list"), "label registry")
            .await
    }

    async fn category_registry(&self, scope: &str) -> Result<Vec<CategoryRecord>, CoreError> {
        self.registry_list(
            Command::new("config/category_registry/list").arg("scope", scope),
            "category registry",
        )
        .await
    }

    async fn states(&self) -> Result<Vec<EntityState>, CoreError> {
        if self.socket.is_connected() {
            let raw = self.socket.send(Command::new("get_states")).await?;
            decode_list(raw, "state listing")
        } else {
            debug!("state listing via stateless fallback");
            let raw = self.rest.get_states().await?;
            decode_list(Value::Array(raw), "state listing")
        }
    }

    async fn automation_config(&self, internal_id: &str) -> Result<Option<Value>, CoreError> {
        if self.socket.is_connected() {
            let command =
                Command::new("config/automation/config/get").arg("config_id", internal_id);
            match self.socket.send(command).await {
                Ok(Value::Null) => Ok(None),
                Ok(value) => Ok(Some(value)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.into()),
            }
        } else {
            Ok(self.rest.get_automation_config(internal_id).await?)
        }
    }

    async fn write_automation_config(
        &self,
        internal_id: &str,
        payload: &Value,
    ) -> Result<(), CoreError> {
        if self.socket.is_connected() {
            let command = Command::new("config/automation/config/update")
                .arg("config_id", internal_id)
                .arg("config", payload.clone());
            self.socket.send(command).await?;
            Ok(())
        } else {
            Ok(self.rest.upsert_automation_config(internal_id, payload).await?)
        }
    }

    async fn delete_automation_config(&self, internal_id: &str) -> Result<(), CoreError> {
        if self.socket.is_connected() {
            let command =
                Command::new("config/automation/config/delete").arg("config_id", internal_id);
            self.socket.send(command).await?;
            Ok(())
        } else {
            Ok(self.rest.delete_automation_config(internal_id).await?)
        }
    }
}

fn decode_list<T: DeserializeOwned>(raw: Value, what: &'static str) -> Result<Vec<T>, CoreError> {
    serde_json::from_value(raw)
        .map_err(|e| CoreError::Internal(format!("malformed {what}: {e}")))
}
