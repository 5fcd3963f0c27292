//! Academe backend: raw record shapes, domain types, and cached access.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod types;
pub mod workflow;

pub use cache::ResourceKind;
pub use cached_client::CachedAcademeClient;
pub use client::AcademeClient;
