// ── Registry join engine ──
//
// The backend stores entities, devices, areas, labels, and categories
// in independent registries and never returns a denormalized view.
// This engine joins them client-side into one record per entity, then
// applies filter predicates and a stable paginated slice.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
use crate::error::CoreError;
use crate::model::{
    AreaRecord, AreaSummary, CategoryRecord, CategorySummary, DeviceRecord, DeviceSummary,
    EntityRecord, EntityState, EntityView, LabelRecord, LabelSummary, Page, SearchFilter,
};
use crate::store::RegistryCache;

pub struct RegistryJoinEngine<B> {
    backend: Arc<B>,
    cache: Arc<RegistryCache>,
}

impl<B: Backend> RegistryJoinEngine<B> {
    pub fn new(backend: Arc<B>, cache: Arc<RegistryCache>) -> Self {
        Self { backend, cache }
    }

    /// Search the denormalized entity set.
    ///
    /// Pagination is a pure slice over the filtered result, stably
    /// ordered by entity identifier; `total_found` is the filtered-set
    /// size before slicing.
    pub async fn search(
        &self,
        filter: &SearchFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<EntityView>, CoreError> {
        let backend = self.backend.as_ref();
        let entities = self.cache.entities(backend).await?;
        let devices = self.cache.devices(backend).await?;
        let areas = self.cache.areas(backend).await?;
        let labels = self.cache.labels(backend).await?;
        let categories = self.cache.categories(backend).await?;
        let states = self.cache.states(backend).await?;

        let device_index: HashMap<&str, &DeviceRecord> = devices
            .iter()
            .map(|d| (d.id.as_str(), d.as_ref()))
            .collect();
        let area_index: HashMap<&str, &AreaRecord> = areas
            .iter()
            .map(|a| (a.area_id.as_str(), a.as_ref()))
            .collect();
        let label_index: HashMap<&str, &LabelRecord> = labels
            .iter()
            .map(|l| (l.label_id.as_str(), l.as_ref()))
            .collect();
        let category_index: HashMap<&str, &CategoryRecord> = categories
            .iter()
            .map(|c| (c.category_id.as_str(), c.as_ref()))
            .collect();
        let state_index: HashMap<&str, &EntityState> = states
            .iter()
            .map(|s| (s.entity_id.as_str(), s.as_ref()))
            .collect();

        let mut views: Vec<EntityView> = entities
            .iter()
            .map(|entity| {
                build_view(
                    entity,
                    &device_index,
                    &area_index,
                    &label_index,
                    &category_index,
                    &state_index,
                )
            })
            .filter(|view| filter.matches(view))
            .collect();

        views.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        debug!(
            matched = views.len(),
            of = entities.len(),
            offset,
            limit,
            "search complete"
        );
        Ok(Page::slice(views, offset, limit))
    }
}

/// Join one entity against the other registries.
fn build_view(
    entity: &EntityRecord,
    device_index: &HashMap<&str, &DeviceRecord>,
    area_index: &HashMap<&str, &AreaRecord>,
    label_index: &HashMap<&str, &LabelRecord>,
    category_index: &HashMap<&str, &CategoryRecord>,
    state_index: &HashMap<&str, &EntityState>,
) -> EntityView {
    let device = entity
        .device_id
        .as_deref()
        .and_then(|id| device_index.get(id).copied());

    // A direct entity→area assignment overrides the device's area.
    let area_id = entity
        .area_id
        .as_deref()
        .or_else(|| device.and_then(|d| d.area_id.as_deref()));
    let area = area_id
        .and_then(|id| area_index.get(id).copied())
        .map(|a| AreaSummary {
            id: a.area_id.clone(),
            name: a.name.clone(),
        });

    // Label set union of entity and device labels, first-seen order.
    let mut label_keys: Vec<&str> = entity.labels.iter().map(String::as_str).collect();
    if let Some(device) = device {
        for key in &device.labels {
            if !label_keys.contains(&key.as_str()) {
                label_keys.push(key);
            }
        }
    }
    let labels = label_keys
        .into_iter()
        .map(|key| LabelSummary {
            id: key.to_owned(),
            name: label_index
                .get(key)
                .map_or_else(|| key.to_owned(), |l| l.name.clone()),
        })
        .collect();

    let mut categories: Vec<CategorySummary> = entity
        .categories
        .iter()
        .map(|(scope, key)| CategorySummary {
            scope: scope.clone(),
            id: key.clone(),
            name: category_index
                .get(key.as_str())
                .map_or_else(|| key.clone(), |c| c.name.clone()),
        })
        .collect();
    categories.sort_by(|a, b| a.scope.cmp(&b.scope));

    let state = state_index.get(entity.entity_id.as_str()).copied();

    EntityView {
        entity_id: entity.entity_id.clone(),
        domain: entity.domain().to_owned(),
        friendly_name: state
            .and_then(EntityState::friendly_name)
            .or_else(|| entity.display_name())
            .map(ToOwned::to_owned),
        state: state.map(|s| s.state.clone()),
        device_class: state
            .and_then(EntityState::device_class)
            .or(entity.original_device_class.as_deref())
            .map(ToOwned::to_owned),
        device: device.map(|d| DeviceSummary {
            id: d.id.clone(),
            name: d.display_name().map(ToOwned::to_owned),
            manufacturer: d.manufacturer.clone(),
            model: d.model.clone(),
        }),
        area,
        labels,
        categories,
        attributes: state.map(|s| s.attributes.clone()).unwrap_or_default(),
    }
}
