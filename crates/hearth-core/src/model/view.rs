// ── Denormalized entity views, search filters, pagination ──
//
// The backend never returns a joined view; `EntityView` is the
// client-side denormalization of entity + state + device + area +
// labels + categories that filters are evaluated against.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Joined sub-records ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub id: String,
    /// Display name; falls back to the key when the label registry has
    /// no record for it.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub scope: String,
    pub id: String,
    pub name: String,
}

// ── EntityView ──────────────────────────────────────────────────────

/// One denormalized per-entity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    pub entity_id: String,
    pub domain: String,
    pub friendly_name: Option<String>,
    pub state: Option<String>,
    pub device_class: Option<String>,
    pub device: Option<DeviceSummary>,
    pub area: Option<AreaSummary>,
    pub labels: Vec<LabelSummary>,
    pub categories: Vec<CategorySummary>,
    /// State attributes, passed through for callers that need them.
    pub attributes: Map<String, Value>,
}

// ── SearchFilter ────────────────────────────────────────────────────

/// Conjunction of optional predicates evaluated against an
/// [`EntityView`]. Stateless value object.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Exact-match on the entity's domain.
    pub domain: Option<String>,
    /// Exact-match on the device class.
    pub device_class: Option<String>,
    /// Area key, or area display name (case-insensitive).
    pub area: Option<String>,
    /// Exact-match on the state value.
    pub state: Option<String>,
    /// Requested labels, matched by key or display name
    /// (case-insensitive).
    pub labels: Vec<String>,
    /// `true`: every requested label must be present (ALL).
    /// `false`: at least one must be present (ANY).
    pub match_all: bool,
    /// Escape hatch: also admit records with zero labels, regardless
    /// of the label filter mode.
    pub include_unlabeled: bool,
}

impl SearchFilter {
    pub fn matches(&self, view: &EntityView) -> bool {
        if let Some(ref domain) = self.domain {
            if view.domain != *domain {
                return false;
            }
        }

        if let Some(ref device_class) = self.device_class {
            if view.device_class.as_deref() != Some(device_class.as_str()) {
                return false;
            }
        }

        if let Some(ref area) = self.area {
            let Some(ref view_area) = view.area else {
                return false;
            };
            if view_area.id != *area && !view_area.name.eq_ignore_ascii_case(area) {
                return false;
            }
        }

        if let Some(ref state) = self.state {
            if view.state.as_deref() != Some(state.as_str()) {
                return false;
            }
        }

        self.labels_match(view)
    }

    fn labels_match(&self, view: &EntityView) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        if self.include_unlabeled && view.labels.is_empty() {
            return true;
        }

        let has = |wanted: &str| {
            view.labels
                .iter()
                .any(|label| label.id == wanted || label.name.eq_ignore_ascii_case(wanted))
        };

        if self.match_all {
            self.labels.iter().all(|wanted| has(wanted))
        } else {
            self.labels.iter().any(|wanted| has(wanted))
        }
    }
}

// ── Page ────────────────────────────────────────────────────────────

/// A stable paginated slice over a filtered result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Size of the filtered set before slicing.
    pub total_found: usize,
    pub offset: usize,
    pub limit: usize,
    /// Computed from `total_found`, never from whether the fetched
    /// batch was full.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Slice an already-filtered, already-ordered result set.
    pub fn slice(filtered: Vec<T>, offset: usize, limit: usize) -> Self {
        let total_found = filtered.len();
        let items: Vec<T> = filtered
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();
        let has_more = offset + items.len() < total_found;

        Self {
            items,
            total_found,
            offset,
            limit,
            has_more,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
