//! Generic read-through caching for remote collections.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Keeps one entry per resource collection, replaced wholesale on refresh
//! - Serves entries younger than the TTL without touching the network
//! - Serves the last good entry when a refresh fails (offline mode)
//! - Optionally persists entries in SQLite across process restarts

mod clock;
mod layer;
mod storage;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use layer::{Fetcher, ReadThroughCache, DEFAULT_TTL_SECS};
pub use storage::{CacheStorage, MemoryStorage, SqliteStorage, StorageBackend};
pub use traits::{CacheEntry, CacheResult, CacheSource, Cacheable, FetchError, NormalizationError};
