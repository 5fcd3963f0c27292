//! Read-through cache that orchestrates freshness checks with network fetching.

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::storage::{CacheStorage, MemoryStorage};
use super::traits::{CacheEntry, CacheResult, Cacheable, FetchError};

/// Default time-to-live of a cache entry: 100 minutes.
pub const DEFAULT_TTL_SECS: i64 = 6000;

/// Remote fetch behind a cache. Called once per refresh attempt.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>, FetchError>> + Send + Sync>;

/// Cache for one resource collection, backed by a remote fetch.
///
/// Reads within the TTL are served from storage. Expired or forced reads go
/// to the network; if that fails, the last good entry is served instead, and
/// only a cold cache surfaces the error.
pub struct ReadThroughCache<T: Cacheable, S: CacheStorage = MemoryStorage> {
  /// Storage key, also used in log output
  name: String,
  fetcher: Fetcher<T>,
  storage: Arc<S>,
  clock: Arc<dyn Clock>,
  ttl: Duration,
  fetch_timeout: Option<std::time::Duration>,
  /// Serialize refreshes so concurrent misses share one fetch
  single_flight: bool,
  refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<T: Cacheable, S: CacheStorage> ReadThroughCache<T, S> {
  /// Create a cache named `name` over `storage`, filled by `fetcher`.
  pub fn new<F, Fut>(name: impl Into<String>, storage: Arc<S>, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
  {
    Self {
      name: name.into(),
      fetcher: Arc::new(move || fetcher().boxed()),
      storage,
      clock: Arc::new(SystemClock),
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
      fetch_timeout: None,
      single_flight: false,
      refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
    }
  }

  /// Set the time-to-live for cached data.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Give up on a fetch after `timeout`; the failure falls back like any other.
  pub fn with_fetch_timeout(mut self, timeout: std::time::Duration) -> Self {
    self.fetch_timeout = Some(timeout);
    self
  }

  pub fn with_single_flight(mut self, enabled: bool) -> Self {
    self.single_flight = enabled;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Get the collection, fetching only when the entry is missing, expired
  /// or `force_refresh` is set.
  pub async fn get(&self, force_refresh: bool) -> Result<Vec<T>, FetchError> {
    Ok(self.get_with_source(force_refresh).await?.data)
  }

  /// Same as [`get`](Self::get), but also reports whether the data is fresh,
  /// newly fetched, or stale because the refresh failed.
  pub async fn get_with_source(
    &self,
    force_refresh: bool,
  ) -> Result<CacheResult<Vec<T>>, FetchError> {
    let now = self.clock.now();
    let cached = self.load_entry();

    if !force_refresh {
      if let Some(entry) = &cached {
        if self.is_fresh(entry, now) {
          debug!(cache = %self.name, items = entry.items.len(), "Serving fresh cache entry");
          return Ok(CacheResult::from_cache(entry.items.clone(), entry.fetched_at));
        }
      }
    }

    if !self.single_flight {
      return self.refresh(cached, now).await;
    }

    let _guard = self.refresh_lock.lock().await;

    // Another caller may have refreshed while we waited for the lock
    let now = self.clock.now();
    let cached = self.load_entry();
    if !force_refresh {
      if let Some(entry) = &cached {
        if self.is_fresh(entry, now) {
          debug!(cache = %self.name, "Refreshed by a concurrent caller");
          return Ok(CacheResult::from_cache(entry.items.clone(), entry.fetched_at));
        }
      }
    }

    self.refresh(cached, now).await
  }

  /// Items of the current entry without touching the network. Empty when
  /// nothing has been fetched yet.
  pub fn cached(&self) -> Vec<T> {
    self
      .load_entry()
      .map(|entry| entry.items)
      .unwrap_or_default()
  }

  /// When the current entry was fetched, if there is one.
  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.load_entry().map(|entry| entry.fetched_at)
  }

  fn is_fresh(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
    now - entry.fetched_at < self.ttl
  }

  async fn refresh(
    &self,
    cached: Option<CacheEntry<T>>,
    now: DateTime<Utc>,
  ) -> Result<CacheResult<Vec<T>>, FetchError> {
    info!(cache = %self.name, "Fetching from backend");

    match self.fetch().await {
      Ok(items) => {
        let entry = CacheEntry::new(items, now);
        if let Err(e) = self.storage.store(&self.name, &entry) {
          warn!(cache = %self.name, error = %e, "Failed to store cache entry");
        }
        debug!(cache = %self.name, items = entry.items.len(), "Cache entry replaced");
        Ok(CacheResult::from_network(entry.items, entry.fetched_at))
      }
      Err(e) => match cached {
        Some(entry) => {
          warn!(
            cache = %self.name,
            error = %e,
            fetched_at = %entry.fetched_at,
            "Fetch failed, serving last good entry"
          );
          Ok(CacheResult::offline(entry.items, entry.fetched_at))
        }
        None => Err(e),
      },
    }
  }

  async fn fetch(&self) -> Result<Vec<T>, FetchError> {
    let fut = (self.fetcher)();
    match self.fetch_timeout {
      Some(limit) => tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(FetchError::Timeout(limit))),
      None => fut.await,
    }
  }

  fn load_entry(&self) -> Option<CacheEntry<T>> {
    match self.storage.load::<T>(&self.name) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(cache = %self.name, error = %e, "Failed to read cache entry");
        None
      }
    }
  }
}

impl<T: Cacheable, S: CacheStorage> Clone for ReadThroughCache<T, S> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      fetcher: Arc::clone(&self.fetcher),
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
      ttl: self.ttl,
      fetch_timeout: self.fetch_timeout,
      single_flight: self.single_flight,
      refresh_lock: Arc::clone(&self.refresh_lock),
    }
  }
}
