// ── Registry cache ──
//
// Read-through cache of registry snapshots fetched via the backend.
// No TTL: entries live until explicitly invalidated after a mutation
// or a caller-forced refresh. Every refetch replaces the snapshot
// wholesale (replace-then-publish, never edit-in-place), so readers
// never observe a partially-updated registry.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::backend::Backend;
use crate::error::CoreError;
use crate::model::{
    AreaRecord, CategoryRecord, DeviceRecord, EntityRecord, EntityState, LabelRecord,
    RegistryKind, RegistryRecord,
};

/// The category registry is scope-qualified; this layer only ever
/// joins automation-scoped categories.
pub const CATEGORY_SCOPE: &str = "automation";

type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Read-shared cache over the five registries plus the state listing.
///
/// Concurrent read-throughs may fetch twice; both publish a complete
/// snapshot, so the race costs a fetch, never a torn read.
pub struct RegistryCache {
    entities: ArcSwapOption<Vec<Arc<EntityRecord>>>,
    devices: ArcSwapOption<Vec<Arc<DeviceRecord>>>,
    areas: ArcSwapOption<Vec<Arc<AreaRecord>>>,
    labels: ArcSwapOption<Vec<Arc<LabelRecord>>>,
    categories: ArcSwapOption<Vec<Arc<CategoryRecord>>>,
    states: ArcSwapOption<Vec<Arc<EntityState>>>,
    refreshed: DashMap<RegistryKind, DateTime<Utc>>,
    states_refreshed: ArcSwapOption<DateTime<Utc>>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self {
            entities: ArcSwapOption::empty(),
            devices: ArcSwapOption::empty(),
            areas: ArcSwapOption::empty(),
            labels: ArcSwapOption::empty(),
            categories: ArcSwapOption::empty(),
            states: ArcSwapOption::empty(),
            refreshed: DashMap::new(),
            states_refreshed: ArcSwapOption::empty(),
        }
    }

    // ── Read-through accessors ───────────────────────────────────────

    pub async fn entities<B: Backend>(
        &self,
        backend: &B,
    ) -> Result<Snapshot<EntityRecord>, CoreError> {
        if let Some(snapshot) = self.entities.load_full() {
            return Ok(snapshot);
        }
        let records = backend.entity_registry().await?;
        Ok(self.publish_registry(&self.entities, RegistryKind::Entity, records))
    }

    pub async fn devices<B: Backend>(
        &self,
        backend: &B,
    ) -> Result<Snapshot<DeviceRecord>, CoreError> {
        if let Some(snapshot) = self.devices.load_full() {
            return Ok(snapshot);
        }
        let records = backend.device_registry().await?;
        Ok(self.publish_registry(&self.devices, RegistryKind::Device, records))
    }

    pub async fn areas<B: Backend>(&self, backend: &B) -> Result<Snapshot<AreaRecord>, CoreError> {
        if let Some(snapshot) = self.areas.load_full() {
            return Ok(snapshot);
        }
        let records = backend.area_registry().await?;
        Ok(self.publish_registry(&self.areas, RegistryKind::Area, records))
    }

    pub async fn labels<B: Backend>(
        &self,
        backend: &B,
    ) -> Result<Snapshot<LabelRecord>, CoreError> {
        if let Some(snapshot) = self.labels.load_full() {
            return Ok(snapshot);
        }
        let records = backend.label_registry().await?;
        Ok(self.publish_registry(&self.labels, RegistryKind::Label, records))
    }

    pub async fn categories<B: Backend>(
        &self,
        backend: &B,
    ) -> Result<Snapshot<CategoryRecord>, CoreError> {
        if let Some(snapshot) = self.categories.load_full() {
            return Ok(snapshot);
        }
        let records = backend.category_registry(CATEGORY_SCOPE).await?;
        Ok(self.publish_registry(&self.categories, RegistryKind::Category, records))
    }

    pub async fn states<B: Backend>(&self, backend: &B) -> Result<Snapshot<EntityState>, CoreError> {
        if let Some(snapshot) = self.states.load_full() {
            return Ok(snapshot);
        }
        let states = backend.states().await?;
        let snapshot: Snapshot<EntityState> =
            Arc::new(states.into_iter().map(Arc::new).collect());
        self.states.store(Some(Arc::clone(&snapshot)));
        self.states_refreshed.store(Some(Arc::new(Utc::now())));
        debug!(count = snapshot.len(), "state snapshot published");
        Ok(snapshot)
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// Look up one cached record by registry kind and stable key.
    /// Misses on uncached registries -- this never fetches.
    pub fn lookup(&self, kind: RegistryKind, key: &str) -> Option<RegistryRecord> {
        match kind {
            RegistryKind::Entity => self
                .entities
                .load_full()?
                .iter()
                .find(|r| r.entity_id == key)
                .map(|r| RegistryRecord::Entity((**r).clone())),
            RegistryKind::Device => self
                .devices
                .load_full()?
                .iter()
                .find(|r| r.id == key)
                .map(|r| RegistryRecord::Device((**r).clone())),
            RegistryKind::Area => self
                .areas
                .load_full()?
                .iter()
                .find(|r| r.area_id == key)
                .map(|r| RegistryRecord::Area((**r).clone())),
            RegistryKind::Label => self
                .labels
                .load_full()?
                .iter()
                .find(|r| r.label_id == key)
                .map(|r| RegistryRecord::Label((**r).clone())),
            RegistryKind::Category => self
                .categories
                .load_full()?
                .iter()
                .find(|r| r.category_id == key)
                .map(|r| RegistryRecord::Category((**r).clone())),
        }
    }

    // ── Invalidation ─────────────────────────────────────────────────

    pub fn invalidate(&self, kind: RegistryKind) {
        match kind {
            RegistryKind::Entity => self.entities.store(None),
            RegistryKind::Device => self.devices.store(None),
            RegistryKind::Area => self.areas.store(None),
            RegistryKind::Label => self.labels.store(None),
            RegistryKind::Category => self.categories.store(None),
        }
        self.refreshed.remove(&kind);
        debug!(%kind, "registry snapshot invalidated");
    }

    pub fn invalidate_states(&self) {
        self.states.store(None);
        self.states_refreshed.store(None);
    }

    /// Invalidate the snapshots an automation write touches: the entity
    /// registry and the state listing.
    pub fn invalidate_after_write(&self) {
        self.invalidate(RegistryKind::Entity);
        self.invalidate_states();
    }

    /// Caller-forced full refresh.
    pub fn invalidate_all(&self) {
        for kind in RegistryKind::iter() {
            self.invalidate(kind);
        }
        self.invalidate_states();
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    pub fn refreshed_at(&self, kind: RegistryKind) -> Option<DateTime<Utc>> {
        self.refreshed.get(&kind).map(|entry| *entry.value())
    }

    pub fn states_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.states_refreshed.load_full().map(|ts| *ts)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish_registry<T>(
        &self,
        slot: &ArcSwapOption<Vec<Arc<T>>>,
        kind: RegistryKind,
        records: Vec<T>,
    ) -> Snapshot<T> {
        let snapshot: Snapshot<T> = Arc::new(records.into_iter().map(Arc::new).collect());
        slot.store(Some(Arc::clone(&snapshot)));
        self.refreshed.insert(kind, Utc::now());
        debug!(%kind, count = snapshot.len(), "registry snapshot published");
        snapshot
    }
}

impl Default for RegistryCache {
    fn default() -> Self {
        Self::new()
    }
}
