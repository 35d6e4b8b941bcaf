// Shared in-memory backend for core integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::{Value, json};

use hearth_core::{
    AreaRecord, Backend, CategoryRecord, CoreError, DeviceRecord, EntityRecord, EntityState,
    LabelRecord,
};

type Tamper = Box<dyn Fn(&Value) -> Value + Send + Sync>;

/// Deterministic backend double: fixed registry data, an automation
/// config store, and counters for asserting what was (not) called.
#[derive(Default)]
pub struct MockBackend {
    pub entities: Vec<EntityRecord>,
    pub devices: Vec<DeviceRecord>,
    pub areas: Vec<AreaRecord>,
    pub labels: Vec<LabelRecord>,
    pub categories: Vec<CategoryRecord>,
    pub states: Vec<EntityState>,
    pub configs: Mutex<BTreeMap<String, Value>>,

    /// When set, every write stores the tampered payload instead of the
    /// requested one -- simulates a backend normalizing or partially
    /// applying a write.
    pub tamper_writes: Option<Tamper>,
    /// When set, config reads fail -- simulates a broken read path
    /// while the write path still works.
    pub fail_config_reads: AtomicBool,

    pub entity_registry_fetches: AtomicUsize,
    pub state_fetches: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MockBackend {
    pub fn stored_config(&self, internal_id: &str) -> Option<Value> {
        self.configs.lock().unwrap().get(internal_id).cloned()
    }

    pub fn config_count(&self) -> usize {
        self.configs.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

impl Backend for MockBackend {
    async fn entity_registry(&self) -> Result<Vec<EntityRecord>, CoreError> {
        self.entity_registry_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.entities.clone())
    }

    async fn device_registry(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        Ok(self.devices.clone())
    }

    async fn area_registry(&self) -> Result<Vec<AreaRecord>, CoreError> {
        Ok(self.areas.clone())
    }

    async fn label_registry(&self) -> Result<Vec<LabelRecord>, CoreError> {
        Ok(self.labels.clone())
    }

    async fn category_registry(&self, _scope: &str) -> Result<Vec<CategoryRecord>, CoreError> {
        Ok(self.categories.clone())
    }

    async fn states(&self) -> Result<Vec<EntityState>, CoreError> {
        self.state_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.states.clone())
    }

    async fn automation_config(&self, internal_id: &str) -> Result<Option<Value>, CoreError> {
        if self.fail_config_reads.load(Ordering::SeqCst) {
            return Err(CoreError::ConnectionFailed {
                reason: "config read path unavailable".into(),
            });
        }
        Ok(self.stored_config(internal_id))
    }

    async fn write_automation_config(
        &self,
        internal_id: &str,
        payload: &Value,
    ) -> Result<(), CoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let stored = match &self.tamper_writes {
            Some(tamper) => tamper(payload),
            None => payload.clone(),
        };
        self.configs
            .lock()
            .unwrap()
            .insert(internal_id.to_owned(), stored);
        Ok(())
    }

    async fn delete_automation_config(&self, internal_id: &str) -> Result<(), CoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().remove(internal_id);
        Ok(())
    }
}

// ── Record builders ─────────────────────────────────────────────────

pub fn entity(value: Value) -> EntityRecord {
    serde_json::from_value(value).unwrap()
}

pub fn device(value: Value) -> DeviceRecord {
    serde_json::from_value(value).unwrap()
}

pub fn area(id: &str, name: &str) -> AreaRecord {
    serde_json::from_value(json!({ "area_id": id, "name": name })).unwrap()
}

pub fn label(id: &str, name: &str) -> LabelRecord {
    serde_json::from_value(json!({ "label_id": id, "name": name })).unwrap()
}

pub fn category(id: &str, name: &str) -> CategoryRecord {
    serde_json::from_value(json!({ "category_id": id, "name": name })).unwrap()
}

pub fn state(value: Value) -> EntityState {
    serde_json::from_value(value).unwrap()
}

/// Registry + state rows for one automation whose internal id both
/// surfaces agree on.
pub fn automation_rows(
    object_id: &str,
    alias: &str,
    internal_id: &str,
) -> (EntityRecord, EntityState) {
    let entity_id = format!("automation.{object_id}");
    (
        entity(json!({
            "entity_id": entity_id,
            "unique_id": internal_id,
            "platform": "automation",
            "name": alias,
        })),
        state(json!({
            "entity_id": entity_id,
            "state": "on",
            "attributes": { "friendly_name": alias, "id": internal_id },
        })),
    )
}
