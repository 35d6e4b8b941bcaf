// Join and search semantics over the denormalized entity set.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{MockBackend, area, category, device, entity, label, state};
use hearth_core::{EntityView, Page, RegistryCache, RegistryJoinEngine, SearchFilter};

/// A small but fully joined world:
///   - hue-bridge device in the kitchen, labeled "hardware"
///   - light.office_lamp on that device, area override to the office,
///     own label "critical"
///   - sensor.kitchen_temp on that device, inheriting the kitchen area
///   - automation.morning_lights with a category and no device
///   - light.bare with no device, area, or labels
fn fixture() -> MockBackend {
    MockBackend {
        entities: vec![
            entity(json!({
                "entity_id": "light.office_lamp",
                "unique_id": "uniq-lamp",
                "device_id": "hue-bridge",
                "area_id": "office",
                "labels": ["critical"],
            })),
            entity(json!({
                "entity_id": "sensor.kitchen_temp",
                "unique_id": "uniq-temp",
                "device_id": "hue-bridge",
                "original_device_class": "temperature",
            })),
            entity(json!({
                "entity_id": "automation.morning_lights",
                "unique_id": "cfg-1",
                "name": "Morning Lights",
                "labels": ["critical"],
                "categories": { "automation": "cat-lighting" },
            })),
            entity(json!({
                "entity_id": "light.bare",
                "unique_id": "uniq-bare",
            })),
        ],
        devices: vec![device(json!({
            "id": "hue-bridge",
            "name": "Hue Bridge",
            "manufacturer": "Signify",
            "model": "BSB002",
            "area_id": "kitchen",
            "labels": ["hardware"],
        }))],
        areas: vec![area("office", "Home Office"), area("kitchen", "Kitchen")],
        labels: vec![label("critical", "Critical"), label("hardware", "Hardware")],
        categories: vec![category("cat-lighting", "Lighting")],
        states: vec![
            state(json!({
                "entity_id": "light.office_lamp",
                "state": "on",
                "attributes": { "friendly_name": "Office Lamp" },
            })),
            state(json!({
                "entity_id": "sensor.kitchen_temp",
                "state": "21.5",
                "attributes": { "device_class": "temperature" },
            })),
            state(json!({
                "entity_id": "automation.morning_lights",
                "state": "on",
                "attributes": { "friendly_name": "Morning Lights", "id": "cfg-1" },
            })),
            state(json!({
                "entity_id": "light.bare",
                "state": "off",
                "attributes": {},
            })),
        ],
        ..MockBackend::default()
    }
}

fn engine(backend: MockBackend) -> RegistryJoinEngine<MockBackend> {
    RegistryJoinEngine::new(Arc::new(backend), Arc::new(RegistryCache::new()))
}

async fn search_all(engine: &RegistryJoinEngine<MockBackend>, filter: &SearchFilter) -> Page<EntityView> {
    engine.search(filter, 0, 100).await.unwrap()
}

fn find<'a>(page: &'a Page<EntityView>, entity_id: &str) -> &'a EntityView {
    page.items
        .iter()
        .find(|view| view.entity_id == entity_id)
        .unwrap_or_else(|| panic!("{entity_id} missing from page"))
}

// ── Join semantics ──────────────────────────────────────────────────

#[tokio::test]
async fn entity_area_overrides_device_area() {
    let engine = engine(fixture());
    let page = search_all(&engine, &SearchFilter::default()).await;

    let lamp = find(&page, "light.office_lamp");
    assert_eq!(lamp.area.as_ref().unwrap().id, "office");
    assert_eq!(lamp.area.as_ref().unwrap().name, "Home Office");

    // No override on the sensor: the device's area wins.
    let sensor = find(&page, "sensor.kitchen_temp");
    assert_eq!(sensor.area.as_ref().unwrap().id, "kitchen");
}

#[tokio::test]
async fn labels_are_the_union_of_entity_and_device_labels() {
    let engine = engine(fixture());
    let page = search_all(&engine, &SearchFilter::default()).await;

    let lamp = find(&page, "light.office_lamp");
    let mut label_names: Vec<&str> = lamp.labels.iter().map(|l| l.name.as_str()).collect();
    label_names.sort_unstable();
    assert_eq!(label_names, vec!["Critical", "Hardware"]);

    let bare = find(&page, "light.bare");
    assert!(bare.labels.is_empty());
}

#[tokio::test]
async fn joined_record_carries_state_device_and_categories() {
    let engine = engine(fixture());
    let page = search_all(&engine, &SearchFilter::default()).await;

    let lamp = find(&page, "light.office_lamp");
    assert_eq!(lamp.state.as_deref(), Some("on"));
    assert_eq!(lamp.friendly_name.as_deref(), Some("Office Lamp"));
    let device = lamp.device.as_ref().unwrap();
    assert_eq!(device.name.as_deref(), Some("Hue Bridge"));
    assert_eq!(device.manufacturer.as_deref(), Some("Signify"));

    let automation = find(&page, "automation.morning_lights");
    assert_eq!(automation.categories.len(), 1);
    assert_eq!(automation.categories[0].scope, "automation");
    assert_eq!(automation.categories[0].name, "Lighting");

    // device_class falls back to the registry when the state lacks it.
    let sensor = find(&page, "sensor.kitchen_temp");
    assert_eq!(sensor.device_class.as_deref(), Some("temperature"));
}

// ── Filter semantics ────────────────────────────────────────────────

#[tokio::test]
async fn domain_filter_is_exact() {
    let engine = engine(fixture());
    let page = search_all(
        &engine,
        &SearchFilter {
            domain: Some("light".into()),
            ..SearchFilter::default()
        },
    )
    .await;

    let ids: Vec<&str> = page.items.iter().map(|v| v.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["light.bare", "light.office_lamp"]);
}

#[tokio::test]
async fn area_filter_matches_key_and_display_name() {
    let engine = engine(fixture());

    let by_key = search_all(
        &engine,
        &SearchFilter {
            area: Some("kitchen".into()),
            ..SearchFilter::default()
        },
    )
    .await;
    assert_eq!(by_key.total_found, 1);
    assert_eq!(by_key.items[0].entity_id, "sensor.kitchen_temp");

    let by_name = search_all(
        &engine,
        &SearchFilter {
            area: Some("home office".into()),
            ..SearchFilter::default()
        },
    )
    .await;
    assert_eq!(by_name.total_found, 1);
    assert_eq!(by_name.items[0].entity_id, "light.office_lamp");
}

#[tokio::test]
async fn label_modes_and_unlabeled_escape_hatch() {
    let engine = engine(fixture());

    // ALL: both labels required -- only the lamp carries both.
    let all = search_all(
        &engine,
        &SearchFilter {
            labels: vec!["critical".into(), "hardware".into()],
            match_all: true,
            ..SearchFilter::default()
        },
    )
    .await;
    let ids: Vec<&str> = all.items.iter().map(|v| v.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["light.office_lamp"]);

    // ANY: at least one.
    let any = search_all(
        &engine,
        &SearchFilter {
            labels: vec!["critical".into(), "hardware".into()],
            match_all: false,
            ..SearchFilter::default()
        },
    )
    .await;
    let ids: Vec<&str> = any.items.iter().map(|v| v.entity_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "automation.morning_lights",
            "light.office_lamp",
            "sensor.kitchen_temp"
        ]
    );

    // include_unlabeled additionally admits the zero-label record.
    let with_unlabeled = search_all(
        &engine,
        &SearchFilter {
            labels: vec!["critical".into(), "hardware".into()],
            match_all: false,
            include_unlabeled: true,
            ..SearchFilter::default()
        },
    )
    .await;
    let ids: Vec<&str> = with_unlabeled
        .items
        .iter()
        .map(|v| v.entity_id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            "automation.morning_lights",
            "light.bare",
            "light.office_lamp",
            "sensor.kitchen_temp"
        ]
    );
}

// ── Pagination ──────────────────────────────────────────────────────

#[tokio::test]
async fn full_window_returns_every_match() {
    let engine = engine(fixture());
    let page = search_all(&engine, &SearchFilter::default()).await;

    assert_eq!(page.total_found, 4);
    assert_eq!(page.items.len(), page.total_found);
    assert!(!page.has_more);
}

#[tokio::test]
async fn consecutive_pages_are_duplicate_free_and_exhaustive() {
    let engine = engine(fixture());
    let mut collected: Vec<String> = Vec::new();

    let mut offset = 0;
    loop {
        let page = engine
            .search(&SearchFilter::default(), offset, 3)
            .await
            .unwrap();
        assert_eq!(page.total_found, 4);
        collected.extend(page.items.iter().map(|v| v.entity_id.clone()));
        if !page.has_more {
            break;
        }
        offset += 3;
    }

    // Stable order by entity identifier, each entity exactly once.
    assert_eq!(
        collected,
        vec![
            "automation.morning_lights",
            "light.bare",
            "light.office_lamp",
            "sensor.kitchen_temp"
        ]
    );
}

#[tokio::test]
async fn second_search_is_served_from_the_cache() {
    let backend = Arc::new(fixture());
    let cache = Arc::new(RegistryCache::new());
    let engine = RegistryJoinEngine::new(Arc::clone(&backend), Arc::clone(&cache));

    let _ = engine.search(&SearchFilter::default(), 0, 10).await.unwrap();
    let _ = engine.search(&SearchFilter::default(), 0, 10).await.unwrap();

    use std::sync::atomic::Ordering;
    assert_eq!(backend.entity_registry_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(backend.state_fetches.load(Ordering::SeqCst), 1);

    // A forced refresh fetches again.
    cache.invalidate_all();
    let _ = engine.search(&SearchFilter::default(), 0, 10).await.unwrap();
    assert_eq!(backend.entity_registry_fetches.load(Ordering::SeqCst), 2);
}
