// hearth-core: Identity resolution, registry joins, and safe automation
// mutations on top of hearth-api.

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod mutate;
pub mod resolve;
pub mod search;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{Backend, LiveBackend};
pub use config::{BackendConfig, TlsVerification};
pub use error::{CoreError, ValidationIssue};
pub use mutate::{MutationCoordinator, MutationOp, MutationOutcome, MutationRequest};
pub use resolve::IdentityResolver;
pub use search::RegistryJoinEngine;
pub use store::{CATEGORY_SCOPE, RegistryCache};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Identity
    AutomationRef, IdentitySource, ResolvedIdentity,
    // Registries
    AreaRecord, CategoryRecord, DeviceRecord, EntityRecord, LabelRecord, RegistryKind,
    RegistryRecord,
    // State
    EntityState,
    // Denormalized views
    AreaSummary, CategorySummary, DeviceSummary, EntityView, LabelSummary, Page, SearchFilter,
};
