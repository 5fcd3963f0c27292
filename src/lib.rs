//! Client library for the Academe project-collaboration backend.
//!
//! Collections (projects, groups, tasks, students) are read through
//! per-resource caches that avoid refetching within a TTL and keep serving
//! the last good data while the backend is unavailable.

pub mod academe;
pub mod cache;
pub mod config;
pub mod logging;

pub use academe::{AcademeClient, CachedAcademeClient, ResourceKind};
pub use cache::{CacheResult, CacheSource, FetchError, ReadThroughCache};
pub use config::Config;
