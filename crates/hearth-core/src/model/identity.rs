// ── Identity types ──
//
// The caller-facing reference (ambiguous, ephemeral) and the resolved
// identity (authoritative, confirmed). The entity identifier and the
// internal identifier are independent namespaces; nothing in this
// module derives one from the other.

use std::collections::BTreeSet;
use std::fmt;

/// A caller-supplied automation reference: a qualified entity
/// identifier, a bare slug, or a free-text alias. Ephemeral -- never
/// persisted, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationRef {
    raw: String,
}

impl AutomationRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The entity identifier this reference names, if taken as an
    /// identifier: qualified input is used as-is, a bare slug gets the
    /// automation namespace prefix.
    pub fn candidate_entity_id(&self) -> String {
        if self.raw.contains('.') {
            self.raw.clone()
        } else {
            format!("automation.{}", self.raw)
        }
    }

    /// Whether the caller qualified the reference with a namespace.
    pub fn is_qualified(&self) -> bool {
        self.raw.contains('.')
    }
}

impl fmt::Display for AutomationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for AutomationRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for AutomationRef {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

// ── IdentitySource ──────────────────────────────────────────────────

/// Which authoritative surface confirmed a resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum IdentitySource {
    /// The entity/config registry (socket surface).
    ConfigRegistry,
    /// The state listing (socket surface or stateless fallback).
    StateRegistry,
}

// ── ResolvedIdentity ────────────────────────────────────────────────

/// The single authoritative answer for a reference.
///
/// Invariant: `internal_id` is only produced when at least one
/// authoritative source confirmed it. Computed fresh per mutation
/// attempt -- the backend's internal id can change if an automation is
/// recreated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Backend-assigned opaque key used for configuration CRUD.
    pub internal_id: String,
    /// Human-facing namespaced identifier.
    pub entity_id: String,
    /// Display alias, when either surface reports one.
    pub alias: Option<String>,
    /// Every surface that confirmed the internal id.
    pub sources: BTreeSet<IdentitySource>,
}

// ── Slug matching ───────────────────────────────────────────────────

/// Normalize free text the way the backend slugs identifiers:
/// lowercase, every non-alphanumeric run collapsed to one underscore.
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut gap = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('_');
            }
            gap = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else {
            gap = true;
        }
    }
    slug
}

/// Case-insensitive alias match: the slugged alias must contain the
/// slugged reference. Containment (not equality) is what lets
/// "office_lamp" find the entity aliased "Office Lamp" while "lamp"
/// matches both "Office Lamp" and "Lamp" -- and is therefore ambiguous.
pub(crate) fn alias_matches(alias: &str, reference: &str) -> bool {
    let haystack = slugify(alias);
    let needle = slugify(reference);
    !needle.is_empty() && haystack.contains(&needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_slug_gets_automation_namespace() {
        let reference = AutomationRef::new("morning_lights");
        assert!(!reference.is_qualified());
        assert_eq!(reference.candidate_entity_id(), "automation.morning_lights");
    }

    #[test]
    fn qualified_reference_is_used_verbatim() {
        let reference = AutomationRef::new("automation.morning_lights");
        assert!(reference.is_qualified());
        assert_eq!(reference.candidate_entity_id(), "automation.morning_lights");
    }

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Office Lamp"), "office_lamp");
        assert_eq!(slugify("  Kettle -- Boiled!  "), "kettle_boiled");
        assert_eq!(slugify("already_slugged"), "already_slugged");
    }

    #[test]
    fn alias_containment_semantics() {
        assert!(alias_matches("Office Lamp", "office_lamp"));
        assert!(alias_matches("Office Lamp", "lamp"));
        assert!(alias_matches("Lamp", "lamp"));
        assert!(!alias_matches("Office Lamp", "kitchen"));
        assert!(!alias_matches("Office Lamp", ""));
    }
}
