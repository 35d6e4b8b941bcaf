// ── Client-side registry storage ──

mod cache;

pub use cache::{CATEGORY_SCOPE, RegistryCache};
