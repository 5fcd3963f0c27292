//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Trait for entities that can be cached.
///
/// Implementors name the entity type used to organize persisted entries.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Entity type name for storage organization (e.g., "project", "group")
  fn entity_type() -> &'static str;
}

/// The single entry a cache holds: the items of the last successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  /// Items in the order the backend returned them
  pub items: Vec<T>,
  /// When the fetch that produced these items completed
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn new(items: Vec<T>, fetched_at: DateTime<Utc>) -> Self {
    Self { items, fetched_at }
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the backend
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
    }
  }

  /// Create a new cache result from cached data that is still fresh.
  pub fn from_cache(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      fetched_at,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      fetched_at,
    }
  }

  /// True when the data is older than the TTL because a refresh failed.
  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::Offline
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still within its TTL
  CacheFresh,
  /// Network unavailable, serving the last good entry
  Offline,
}

/// A raw backend record that could not be mapped into its domain shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to normalize {resource} record #{index}: {message}")]
pub struct NormalizationError {
  /// Resource collection the record came from (e.g., "groups")
  pub resource: String,
  /// Position of the record in the fetched collection
  pub index: usize,
  pub message: String,
}

/// Failure of the remote fetch behind a cache.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
  /// Transport-level failure (connection refused, DNS, TLS, ...)
  #[error("request failed: {message}")]
  Http { message: String },

  /// Backend answered with a non-success status
  #[error("backend returned {status}: {body}")]
  Status { status: u16, body: String },

  /// Fetch did not complete within the configured timeout
  #[error("request timed out after {0:?}")]
  Timeout(Duration),

  /// Response body was not the expected JSON shape
  #[error("failed to decode response: {message}")]
  Decode { message: String },

  #[error(transparent)]
  Normalization(#[from] NormalizationError),
}

impl From<reqwest::Error> for FetchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      FetchError::Decode {
        message: e.to_string(),
      }
    } else {
      FetchError::Http {
        message: e.to_string(),
      }
    }
  }
}
