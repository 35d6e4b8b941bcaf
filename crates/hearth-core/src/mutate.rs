// ── Mutation coordination ──
//
// Orchestrates the Validating → Resolving → Applying → Verifying
// sequence for automation writes. Resolution failure aborts before any
// network write -- that is the control preventing silent duplicate
// creation. Verification mismatches are reported, never auto-retried:
// retrying a partially-applied write risks a second side effect.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{CoreError, ValidationIssue};
use crate::model::AutomationRef;
use crate::resolve::IdentityResolver;
use crate::store::RegistryCache;

// ── Requests and outcomes ───────────────────────────────────────────

/// One mutation request entering the coordinator.
#[derive(Debug, Clone)]
pub enum MutationRequest {
    /// Create a new automation under a freshly minted internal id.
    Create { payload: Value },
    /// Update the automation the reference resolves to.
    Update {
        reference: AutomationRef,
        payload: Value,
    },
    /// Delete the automation the reference resolves to.
    Delete { reference: AutomationRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MutationOp {
    Created,
    Updated,
    Deleted,
}

/// Successful terminal state of a mutation: the write was applied and
/// the re-read confirmed it.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub operation: MutationOp,
    pub internal_id: String,
    /// Known for updates and deletes (carried from resolution);
    /// creates learn their entity id on the next registry refresh.
    pub entity_id: Option<String>,
}

// ── MutationCoordinator ─────────────────────────────────────────────

pub struct MutationCoordinator<B> {
    backend: Arc<B>,
    cache: Arc<RegistryCache>,
    resolver: IdentityResolver<B>,
}

impl<B: Backend> MutationCoordinator<B> {
    pub fn new(backend: Arc<B>, cache: Arc<RegistryCache>) -> Self {
        let resolver = IdentityResolver::new(Arc::clone(&backend), Arc::clone(&cache));
        Self {
            backend,
            cache,
            resolver,
        }
    }

    /// Run one mutation through the full sequence.
    pub async fn apply(&self, request: MutationRequest) -> Result<MutationOutcome, CoreError> {
        match request {
            MutationRequest::Create { payload } => {
                validate_automation_payload(&payload)?;
                let internal_id = Uuid::new_v4().simple().to_string();
                debug!(%internal_id, "creating automation");
                self.write_and_verify(&internal_id, payload, None, MutationOp::Created)
                    .await
            }

            MutationRequest::Update { reference, payload } => {
                validate_automation_payload(&payload)?;
                let identity = self.resolver.resolve(&reference).await?;
                debug!(
                    reference = %reference,
                    internal_id = %identity.internal_id,
                    "resolved update target"
                );
                self.write_and_verify(
                    &identity.internal_id,
                    payload,
                    Some(identity.entity_id),
                    MutationOp::Updated,
                )
                .await
            }

            MutationRequest::Delete { reference } => {
                let identity = self.resolver.resolve(&reference).await?;
                let deleted = self
                    .backend
                    .delete_automation_config(&identity.internal_id)
                    .await;
                self.cache.invalidate_after_write();
                deleted?;

                match self.backend.automation_config(&identity.internal_id).await {
                    Ok(None) => Ok(MutationOutcome {
                        operation: MutationOp::Deleted,
                        internal_id: identity.internal_id,
                        entity_id: Some(identity.entity_id),
                    }),
                    Ok(Some(observed)) => Err(CoreError::Verification {
                        expected: Value::Null,
                        observed: Some(observed),
                        detail: "object still present after delete".into(),
                    }),
                    Err(e) => Err(CoreError::Verification {
                        expected: Value::Null,
                        observed: None,
                        detail: format!("could not confirm deletion: {e}"),
                    }),
                }
            }
        }
    }

    async fn write_and_verify(
        &self,
        internal_id: &str,
        payload: Value,
        entity_id: Option<String>,
        operation: MutationOp,
    ) -> Result<MutationOutcome, CoreError> {
        let written = self
            .backend
            .write_automation_config(internal_id, &payload)
            .await;
        // The attempt touched the entity registry and state listing
        // whether it succeeded or not; stale snapshots must not be
        // served afterwards.
        self.cache.invalidate_after_write();
        written?;

        match self.backend.automation_config(internal_id).await {
            Ok(Some(observed)) => {
                let diverged = mismatched_fields(&payload, &observed);
                if diverged.is_empty() {
                    debug!(%internal_id, %operation, "write verified");
                    Ok(MutationOutcome {
                        operation,
                        internal_id: internal_id.to_owned(),
                        entity_id,
                    })
                } else {
                    Err(CoreError::Verification {
                        expected: payload,
                        observed: Some(observed),
                        detail: format!("fields diverge after write: {}", diverged.join(", ")),
                    })
                }
            }
            Ok(None) => Err(CoreError::Verification {
                expected: payload,
                observed: None,
                detail: "written object not readable afterwards".into(),
            }),
            // "Could not check" is a distinct outcome from "checked and
            // it matched" -- it is never reported as success.
            Err(e) => Err(CoreError::Verification {
                expected: payload,
                observed: None,
                detail: format!("verification read failed: {e}"),
            }),
        }
    }
}

/// Subset comparison: every requested top-level field must appear in
/// the observed config with the same value. Backend-added fields are
/// ignored.
fn mismatched_fields(expected: &Value, observed: &Value) -> Vec<String> {
    let Some(expected_map) = expected.as_object() else {
        return Vec::new();
    };
    expected_map
        .iter()
        .filter(|(key, value)| observed.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

// ── Structural payload validation ────────────────────────────────────

/// Keys whose value must be a list of steps when present. Both the
/// singular and plural spellings are accepted.
const BLOCK_KEYS: [&str; 6] = [
    "trigger",
    "triggers",
    "condition",
    "conditions",
    "action",
    "actions",
];

const STRING_KEYS: [&str; 4] = ["id", "alias", "description", "mode"];

/// Check the payload against the structural schema.
///
/// Step blocks are opaque-but-well-formed: unrecognized step kinds are
/// accepted, since the backend -- not this layer -- is authoritative on
/// domain semantics. Only shape violations fail, and they fail before
/// any network call.
pub fn validate_automation_payload(payload: &Value) -> Result<(), CoreError> {
    let Some(object) = payload.as_object() else {
        return Err(CoreError::Validation {
            issues: vec![ValidationIssue {
                path: "$".into(),
                expected: "object",
                found: type_name(payload).into(),
            }],
        });
    };

    let mut issues = Vec::new();

    for key in STRING_KEYS {
        if let Some(value) = object.get(key) {
            if !value.is_string() {
                issues.push(ValidationIssue {
                    path: key.into(),
                    expected: "string",
                    found: type_name(value).into(),
                });
            }
        }
    }

    if let Some(value) = object.get("variables") {
        if !value.is_object() {
            issues.push(ValidationIssue {
                path: "variables".into(),
                expected: "object",
                found: type_name(value).into(),
            });
        }
    }

    for key in BLOCK_KEYS {
        let Some(block) = object.get(key) else {
            continue;
        };
        let Some(steps) = block.as_array() else {
            issues.push(ValidationIssue {
                path: key.into(),
                expected: "array",
                found: type_name(block).into(),
            });
            continue;
        };
        for (index, step) in steps.iter().enumerate() {
            if !step.is_object() && !step.is_string() {
                issues.push(ValidationIssue {
                    path: format!("{key}[{index}]"),
                    expected: "object or shorthand string",
                    found: type_name(step).into(),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation { issues })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ───────────────────────────────────────────────────────────
