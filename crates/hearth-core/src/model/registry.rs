// ── Registry record types ──
//
// One typed struct per backend registry, each with a stable
// backend-assigned key and a flattened attribute bag for everything the
// backend sends beyond the fields this layer joins or filters on.
// Entries are replaced wholesale on refetch -- these types carry no
// client-side bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── RegistryKind ────────────────────────────────────────────────────

/// The five backend registries joined client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum RegistryKind {
    Entity,
    Device,
    Area,
    Label,
    Category,
}

// ── Per-registry records ────────────────────────────────────────────

/// Entity registry record.
///
/// `unique_id` is the backend-assigned internal identifier -- an
/// independent namespace from `entity_id`. The only correct link
/// between the two is the one this record provides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Scope -> category key assignments.
    #[serde(default)]
    pub categories: HashMap<String, String>,
    #[serde(default)]
    pub original_device_class: Option<String>,
    #[serde(default)]
    pub disabled_by: Option<String>,
    #[serde(default)]
    pub hidden_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRecord {
    /// The namespace prefix of the entity identifier.
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    /// The identifier with its namespace prefix stripped.
    pub fn object_id(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(_, object)| object)
    }

    /// User-assigned alias, falling back to the integration-provided one.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.original_name.as_deref())
    }
}

/// Device registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_by_user: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    pub fn display_name(&self) -> Option<&str> {
        self.name_by_user.as_deref().or(self.name.as_deref())
    }
}

/// Area registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaRecord {
    pub area_id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Label registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    pub label_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Category registry record. Listings are scoped; the scope is carried
/// by the fetch, not the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── RegistryRecord ──────────────────────────────────────────────────

/// Closed tagged union over every registry record kind.
///
/// Code paths selecting on registry kind are exhaustive and checked at
/// compile time; backend-specific extras live in each variant's
/// attribute bag rather than behind runtime shape probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryRecord {
    Entity(EntityRecord),
    Device(DeviceRecord),
    Area(AreaRecord),
    Label(LabelRecord),
    Category(CategoryRecord),
}

impl RegistryRecord {
    pub fn kind(&self) -> RegistryKind {
        match self {
            Self::Entity(_) => RegistryKind::Entity,
            Self::Device(_) => RegistryKind::Device,
            Self::Area(_) => RegistryKind::Area,
            Self::Label(_) => RegistryKind::Label,
            Self::Category(_) => RegistryKind::Category,
        }
    }

    /// The stable backend-assigned key for this record.
    pub fn key(&self) -> &str {
        match self {
            Self::Entity(e) => &e.entity_id,
            Self::Device(d) => &d.id,
            Self::Area(a) => &a.area_id,
            Self::Label(l) => &l.label_id,
            Self::Category(c) => &c.category_id,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_record_splits_domain_and_object_id() {
        let record: EntityRecord = serde_json::from_value(json!({
            "entity_id": "automation.morning_lights"
        }))
        .unwrap();

        assert_eq!(record.domain(), "automation");
        assert_eq!(record.object_id(), "morning_lights");
    }

    #[test]
    fn entity_record_keeps_backend_extras() {
        let record: EntityRecord = serde_json::from_value(json!({
            "entity_id": "light.office_lamp",
            "unique_id": "0xdeadbeef",
            "icon": "mdi:lamp",
            "options": { "light": { "favorite_colors": [] } }
        }))
        .unwrap();

        assert_eq!(record.unique_id.as_deref(), Some("0xdeadbeef"));
        assert_eq!(record.extra["icon"], "mdi:lamp");
        assert!(record.extra.contains_key("options"));
    }

    #[test]
    fn display_name_prefers_user_assigned() {
        let record: EntityRecord = serde_json::from_value(json!({
            "entity_id": "light.office_lamp",
            "name": "Desk Lamp",
            "original_name": "Office Lamp"
        }))
        .unwrap();
        assert_eq!(record.display_name(), Some("Desk Lamp"));

        let record: DeviceRecord = serde_json::from_value(json!({
            "id": "dev1",
            "name": "Hue Bridge",
            "name_by_user": "Living Room Bridge"
        }))
        .unwrap();
        assert_eq!(record.display_name(), Some("Living Room Bridge"));
    }

    #[test]
    fn registry_record_key_per_kind() {
        let area = RegistryRecord::Area(
            serde_json::from_value(json!({ "area_id": "office", "name": "Office" })).unwrap(),
        );
        assert_eq!(area.kind(), RegistryKind::Area);
        assert_eq!(area.key(), "office");

        let label = RegistryRecord::Label(
            serde_json::from_value(json!({ "label_id": "critical", "name": "Critical" })).unwrap(),
        );
        assert_eq!(label.kind(), RegistryKind::Label);
        assert_eq!(label.key(), "critical");
    }

    #[test]
    fn registry_kind_display_is_snake_case() {
        assert_eq!(RegistryKind::Entity.to_string(), "entity");
        assert_eq!(RegistryKind::Category.to_string(), "category");
    }
}
