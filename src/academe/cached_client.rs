//! Cached Academe client that wraps AcademeClient with transparent caching.

use chrono::Duration;
use color_eyre::Result;
use std::sync::Arc;
use tracing::warn;

use crate::cache::{
  CacheStorage, Clock, FetchError, MemoryStorage, ReadThroughCache, SqliteStorage, StorageBackend,
  SystemClock,
};
use crate::config::{CacheConfig, Config};

use super::api_types::{ApiGroup, ApiProject, ApiRecord, ApiTask, ApiUser};
use super::cache::ResourceKind;
use super::client::AcademeClient;
use super::types::{Group, Project, Student, Task, TaskStatus};
use super::workflow;

/// Academe client with one read-through cache per collection.
///
/// Collections are served from cache within the TTL and fall back to the
/// last good data when the backend is unreachable. Single-record reads and
/// writes go straight to the backend.
pub struct CachedAcademeClient<S: CacheStorage = StorageBackend> {
  inner: AcademeClient,
  projects: ReadThroughCache<Project, S>,
  groups: ReadThroughCache<Group, S>,
  tasks: ReadThroughCache<Task, S>,
  students: ReadThroughCache<Student, S>,
}

impl CachedAcademeClient<StorageBackend> {
  /// Create a new cached client from configuration.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = AcademeClient::new(config)?;
    let storage = if config.cache.persist {
      StorageBackend::Sqlite(SqliteStorage::open()?)
    } else {
      StorageBackend::Memory(MemoryStorage::new())
    };

    Self::with_storage(
      inner,
      Arc::new(storage),
      &config.cache,
      Arc::new(SystemClock),
    )
  }
}

impl<S: CacheStorage> CachedAcademeClient<S> {
  /// Build the caches over `storage`. Fails if `settings` holds a TTL that
  /// cannot be represented.
  pub fn with_storage(
    inner: AcademeClient,
    storage: Arc<S>,
    settings: &CacheConfig,
    clock: Arc<dyn Clock>,
  ) -> Result<Self> {
    let ttl = settings.ttl()?;
    let parts = (&inner, &storage, settings, ttl, &clock);
    Ok(Self {
      projects: build_cache::<ApiProject, S>(ResourceKind::Projects, parts),
      groups: build_cache::<ApiGroup, S>(ResourceKind::Groups, parts),
      tasks: build_cache::<ApiTask, S>(ResourceKind::Tasks, parts),
      students: build_cache::<ApiUser, S>(ResourceKind::Students, parts),
      inner,
    })
  }

  pub fn projects_cache(&self) -> &ReadThroughCache<Project, S> {
    &self.projects
  }

  pub fn groups_cache(&self) -> &ReadThroughCache<Group, S> {
    &self.groups
  }

  pub fn tasks_cache(&self) -> &ReadThroughCache<Task, S> {
    &self.tasks
  }

  pub fn students_cache(&self) -> &ReadThroughCache<Student, S> {
    &self.students
  }

  pub async fn projects(&self, force_refresh: bool) -> Result<Vec<Project>, FetchError> {
    self.projects.get(force_refresh).await
  }

  pub async fn groups(&self, force_refresh: bool) -> Result<Vec<Group>, FetchError> {
    self.groups.get(force_refresh).await
  }

  pub async fn tasks(&self, force_refresh: bool) -> Result<Vec<Task>, FetchError> {
    self.tasks.get(force_refresh).await
  }

  pub async fn students(&self, force_refresh: bool) -> Result<Vec<Student>, FetchError> {
    self.students.get(force_refresh).await
  }

  pub fn projects_cached(&self) -> Vec<Project> {
    self.projects.cached()
  }

  pub fn groups_cached(&self) -> Vec<Group> {
    self.groups.cached()
  }

  pub fn tasks_cached(&self) -> Vec<Task> {
    self.tasks.cached()
  }

  pub fn students_cached(&self) -> Vec<Student> {
    self.students.cached()
  }

  /// Get a single task (not cached - always current).
  pub async fn task(&self, task_id: &str) -> Result<Task, FetchError> {
    self.inner.get_task(task_id).await
  }

  /// Move a task one step along its workflow on behalf of `user_id`, then
  /// refresh the task list so readers see the change.
  pub async fn advance_task(&self, task_id: &str, user_id: &str) -> Result<TaskStatus> {
    let task = self.inner.get_task(task_id).await?;
    let next = workflow::advance(&task, user_id)?;
    self.inner.update_task_status(&task, next).await?;

    // The write went through; a failed refresh just leaves the old list
    if let Err(e) = self.tasks.get(true).await {
      warn!(task = task_id, error = %e, "Task list refresh after status change failed");
    }

    Ok(next)
  }

  pub fn client(&self) -> &AcademeClient {
    &self.inner
  }
}

impl<S: CacheStorage> Clone for CachedAcademeClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      projects: self.projects.clone(),
      groups: self.groups.clone(),
      tasks: self.tasks.clone(),
      students: self.students.clone(),
    }
  }
}

/// Shared inputs for building each collection's cache.
type CacheParts<'a, S> = (
  &'a AcademeClient,
  &'a Arc<S>,
  &'a CacheConfig,
  Duration,
  &'a Arc<dyn Clock>,
);

fn build_cache<A, S>(
  kind: ResourceKind,
  (inner, storage, settings, ttl, clock): CacheParts<'_, S>,
) -> ReadThroughCache<A::Domain, S>
where
  A: ApiRecord,
  A::Domain: crate::cache::Cacheable,
  S: CacheStorage,
{
  let client = inner.clone();
  let cache = ReadThroughCache::new(kind.key(), Arc::clone(storage), move || {
    let client = client.clone();
    async move { client.fetch_collection::<A>(kind).await }
  })
  .with_ttl(ttl)
  .with_single_flight(settings.single_flight)
  .with_clock(Arc::clone(clock));

  match settings.fetch_timeout_secs {
    Some(secs) => cache.with_fetch_timeout(std::time::Duration::from_secs(secs)),
    None => cache,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::academe::client::tests::StubBackend;
  use crate::academe::types::MemberRole;
  use crate::cache::{CacheSource, ManualClock};
  use chrono::Utc;

  fn client_for(
    url: &str,
    clock: &Arc<ManualClock>,
    storage: Arc<MemoryStorage>,
  ) -> CachedAcademeClient<MemoryStorage> {
    let inner = AcademeClient::with_base_url(url, None).unwrap();
    CachedAcademeClient::with_storage(inner, storage, &CacheConfig::default(), clock.clone())
      .unwrap()
  }

  const GROUPS: &str = r#"[{"id":"g1","name":"Team A","leader_id":"u1","members":[{"id":"u1","ho_ten":"An"},{"id":"u2","ho_ten":"Binh"}]}]"#;

  #[tokio::test]
  async fn test_groups_are_cached_per_ttl() {
    let backend = StubBackend::start(200, GROUPS).await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let client = client_for(&backend.url, &clock, Arc::new(MemoryStorage::new()));

    let groups = client.groups(false).await.unwrap();
    assert_eq!(groups[0].members[0].role, MemberRole::Leader);

    clock.advance(Duration::seconds(5999));
    client.groups(false).await.unwrap();
    assert_eq!(backend.hits(), 1);

    clock.advance(Duration::seconds(2));
    client.groups(false).await.unwrap();
    assert_eq!(backend.hits(), 2);

    client.groups(true).await.unwrap();
    assert_eq!(backend.hits(), 3);
  }

  #[tokio::test]
  async fn test_resources_have_separate_entries() {
    let backend = StubBackend::start(200, "[]").await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let client = client_for(&backend.url, &clock, Arc::new(MemoryStorage::new()));

    client.projects(false).await.unwrap();
    client.tasks(false).await.unwrap();
    client.students(false).await.unwrap();
    client.projects(false).await.unwrap();

    assert_eq!(backend.hits(), 3);
    let paths: Vec<String> = backend
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter_map(|r| r.lines().next().map(String::from))
      .collect();
    assert_eq!(
      paths,
      vec![
        "GET /projects/ HTTP/1.1",
        "GET /tasks/ HTTP/1.1",
        "GET /users/get-all HTTP/1.1"
      ]
    );
  }

  #[tokio::test]
  async fn test_backend_outage_serves_last_good_groups() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let online = StubBackend::start(200, GROUPS).await;
    client_for(&online.url, &clock, Arc::clone(&storage))
      .groups(false)
      .await
      .unwrap();

    let failing = StubBackend::start(503, r#"{"detail":"down"}"#).await;
    let client = client_for(&failing.url, &clock, storage);

    let result = client.groups_cache().get_with_source(true).await.unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data[0].name, "Team A");
    assert_eq!(client.groups_cached().len(), 1);
  }

  #[tokio::test]
  async fn test_cold_outage_is_an_error() {
    let failing = StubBackend::start(503, r#"{"detail":"down"}"#).await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let client = client_for(&failing.url, &clock, Arc::new(MemoryStorage::new()));

    let err = client.projects(false).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert!(client.projects_cached().is_empty());
  }

  #[tokio::test]
  async fn test_malformed_record_fails_fetch() {
    let backend = StubBackend::start(200, r#"[{"id":"t1"}, 42]"#).await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let client = client_for(&backend.url, &clock, Arc::new(MemoryStorage::new()));

    let err = client.tasks(false).await.unwrap_err();
    match err {
      FetchError::Normalization(e) => {
        assert_eq!(e.resource, "tasks");
        assert_eq!(e.index, 1);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn test_advance_rejects_unassigned_user() {
    let backend = StubBackend::start(
      200,
      r#"{"id":"t1","status":"todo","assigned_students":[{"id":"u1","ho_ten":"An"}]}"#,
    )
    .await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let client = client_for(&backend.url, &clock, Arc::new(MemoryStorage::new()));

    assert!(client.advance_task("t1", "u2").await.is_err());
    // Only the task lookup reached the backend
    assert_eq!(backend.hits(), 1);
  }

  #[tokio::test]
  async fn test_advance_sends_nested_group_and_survives_failed_refresh() {
    // Every request gets the task object, so the follow-up list refresh
    // fails to decode on a cold cache
    let backend = StubBackend::start(
      200,
      r#"{"id":"t1","title":"Lexer","status":"todo","group":{"id":"g1","name":"Team A"},"assigned_students":[{"id":"u1","ho_ten":"An"}]}"#,
    )
    .await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let client = client_for(&backend.url, &clock, Arc::new(MemoryStorage::new()));

    let status = client.advance_task("t1", "u1").await.unwrap();
    assert_eq!(status, TaskStatus::InProgress);
    assert_eq!(backend.hits(), 3);
    assert!(client.tasks_cached().is_empty());

    let requests = backend.requests.lock().unwrap();
    assert!(requests[1].starts_with("PUT /tasks/t1 HTTP/1.1"));
    assert!(requests[1].contains(r#""group_id":"g1""#), "{}", requests[1]);
    assert!(requests[1].contains(r#""status":"in-progress""#));
    assert!(requests[2].starts_with("GET /tasks/ HTTP/1.1"));
  }

  #[tokio::test]
  async fn test_out_of_range_ttl_is_rejected() {
    let inner = AcademeClient::with_base_url("http://127.0.0.1:9", None).unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

    for ttl_secs in [10_000_000_000_000_000, u64::MAX] {
      let settings = CacheConfig {
        ttl_secs,
        ..CacheConfig::default()
      };
      let result = CachedAcademeClient::with_storage(
        inner.clone(),
        Arc::new(MemoryStorage::new()),
        &settings,
        Arc::clone(&clock),
      );
      assert!(result.is_err(), "ttl_secs {} should be rejected", ttl_secs);
    }
  }
}
