// ── Domain model ──

pub mod identity;
pub mod registry;
pub mod state;
pub mod view;

pub use identity::{AutomationRef, IdentitySource, ResolvedIdentity};
pub use registry::{
    AreaRecord, CategoryRecord, DeviceRecord, EntityRecord, LabelRecord, RegistryKind,
    RegistryRecord,
};
pub use state::EntityState;
pub use view::{
    AreaSummary, CategorySummary, DeviceSummary, EntityView, LabelSummary, Page, SearchFilter,
};
