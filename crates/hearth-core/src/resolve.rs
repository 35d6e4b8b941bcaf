// ── Identity resolution ──
//
// Maps a caller-supplied automation reference onto the backend's
// authoritative internal identifier before any mutation is attempted.
// The internal id is never derived by transforming the human-facing
// identifier -- the two are independent namespaces, and the only
// correct link is the one the backend's registries provide.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::CoreError;
use crate::model::identity::alias_matches;
use crate::model::{AutomationRef, IdentitySource, ResolvedIdentity};
use crate::store::RegistryCache;

/// Resolves references against the entity registry and the state
/// listing, consulting the cache first and the stateless surface as
/// fallback. Results are computed fresh per call -- never cached,
/// because the backend's internal id changes if an object is recreated.
pub struct IdentityResolver<B> {
    backend: Arc<B>,
    cache: Arc<RegistryCache>,
}

#[derive(Debug)]
struct Candidate {
    entity_id: String,
    alias: Option<String>,
    config_registry_id: Option<String>,
    state_registry_id: Option<String>,
}

impl Candidate {
    fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_owned(),
            alias: None,
            config_registry_id: None,
            state_registry_id: None,
        }
    }

    fn describe(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} ({alias})", self.entity_id),
            None => self.entity_id.clone(),
        }
    }
}

impl<B: Backend> IdentityResolver<B> {
    pub fn new(backend: Arc<B>, cache: Arc<RegistryCache>) -> Self {
        Self { backend, cache }
    }

    /// Resolve a reference to the single authoritative identity.
    ///
    /// A match is accepted only when exactly one candidate is found:
    /// several alias matches are [`CoreError::Ambiguous`] (never
    /// silently the first one), zero matches after checking both
    /// surfaces is [`CoreError::NotFound`].
    pub async fn resolve(&self, reference: &AutomationRef) -> Result<ResolvedIdentity, CoreError> {
        let wanted = reference.candidate_entity_id();
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();

        // Config-registry pass (socket-only). When the socket surface is
        // down, resolution continues from the state listing alone.
        let registry = match self.cache.entities(self.backend.as_ref()).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) if surface_unavailable(&e) => {
                warn!(error = %e, "entity registry unavailable, resolving from state listing only");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(ref records) = registry {
            for record in records.iter() {
                let by_id = record.entity_id == wanted;
                let by_alias = record
                    .display_name()
                    .is_some_and(|name| alias_matches(name, reference.raw()));
                if by_id || by_alias {
                    let entry = candidates
                        .entry(record.entity_id.clone())
                        .or_insert_with(|| Candidate::new(&record.entity_id));
                    if entry.alias.is_none() {
                        entry.alias = record.display_name().map(ToOwned::to_owned);
                    }
                    entry.config_registry_id.clone_from(&record.unique_id);
                }
            }
        }

        // State-registry pass. The backend falls back to the stateless
        // surface internally when the socket is not Ready.
        let states = self.cache.states(self.backend.as_ref()).await?;
        for state in states.iter() {
            let by_id = state.entity_id == wanted;
            let by_alias = state
                .friendly_name()
                .is_some_and(|name| alias_matches(name, reference.raw()));
            if by_id || by_alias {
                let entry = candidates
                    .entry(state.entity_id.clone())
                    .or_insert_with(|| Candidate::new(&state.entity_id));
                if entry.alias.is_none() {
                    entry.alias = state.friendly_name().map(ToOwned::to_owned);
                }
                entry.state_registry_id = state.config_id().map(ToOwned::to_owned);
            }
        }

        if candidates.is_empty() {
            let detail = if registry.is_some() {
                "no identifier or alias match on either surface".to_owned()
            } else {
                "no match in the state listing (config registry unavailable)".to_owned()
            };
            return Err(CoreError::NotFound {
                reference: reference.raw().to_owned(),
                detail,
            });
        }

        let mut matched: Vec<Candidate> = candidates.into_values().collect();
        if matched.len() > 1 {
            return Err(CoreError::Ambiguous {
                reference: reference.raw().to_owned(),
                candidates: matched.iter().map(Candidate::describe).collect(),
            });
        }
        let candidate = matched.remove(0);

        // When both surfaces were consulted, they must agree the object
        // exists at all; a one-sided entity is never mutated on faith.
        if let Some(ref records) = registry {
            let in_registry = records.iter().any(|r| r.entity_id == candidate.entity_id);
            let in_states = states.iter().any(|s| s.entity_id == candidate.entity_id);
            if in_registry != in_states {
                let (present, absent) = if in_registry {
                    ("config registry", "state listing")
                } else {
                    ("state listing", "config registry")
                };
                return Err(CoreError::NotFound {
                    reference: reference.raw().to_owned(),
                    detail: format!(
                        "surfaces disagree about {}: present in the {present}, absent from the {absent}",
                        candidate.entity_id
                    ),
                });
            }
        }

        // An internal id is trusted only when an authoritative source
        // provides it -- and when both do, they must provide the same one.
        let mut sources = BTreeSet::new();
        let internal_id = match (candidate.config_registry_id, candidate.state_registry_id) {
            (Some(config_id), Some(state_id)) => {
                if config_id != state_id {
                    return Err(CoreError::Ambiguous {
                        reference: reference.raw().to_owned(),
                        candidates: vec![
                            format!("{config_id} (config registry)"),
                            format!("{state_id} (state registry)"),
                        ],
                    });
                }
                sources.insert(IdentitySource::ConfigRegistry);
                sources.insert(IdentitySource::StateRegistry);
                config_id
            }
            (Some(config_id), None) => {
                sources.insert(IdentitySource::ConfigRegistry);
                config_id
            }
            (None, Some(state_id)) => {
                sources.insert(IdentitySource::StateRegistry);
                state_id
            }
            (None, None) => {
                return Err(CoreError::NotFound {
                    reference: reference.raw().to_owned(),
                    detail: format!(
                        "{} matched, but no authoritative source provides its internal identifier",
                        candidate.entity_id
                    ),
                });
            }
        };

        debug!(
            reference = %reference,
            entity_id = %candidate.entity_id,
            %internal_id,
            "reference resolved"
        );

        Ok(ResolvedIdentity {
            internal_id,
            entity_id: candidate.entity_id,
            alias: candidate.alias,
            sources,
        })
    }
}

fn surface_unavailable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Disconnected | CoreError::ConnectionFailed { .. } | CoreError::Timeout { .. }
    )
}

// ── Tests ───────────────────────────────────────────────────────────
