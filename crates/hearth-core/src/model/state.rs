// ── Entity state ──
//
// The state registry is the second authoritative surface consulted
// during identity resolution: automation states expose the internal
// config id as an `id` attribute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity's current state as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityState {
    /// The namespace prefix of the entity identifier.
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    /// Free-text display alias, if the backend reports one.
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }

    pub fn device_class(&self) -> Option<&str> {
        self.attributes.get("device_class").and_then(Value::as_str)
    }

    /// The internal config id carried in the state attributes.
    ///
    /// Present on automation states; this is the state registry's link
    /// between the entity identifier and the internal identifier.
    pub fn config_id(&self) -> Option<&str> {
        self.attributes.get("id").and_then(Value::as_str)
    }
}
