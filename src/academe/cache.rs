//! Caching implementations for Academe types.

use std::fmt;

use crate::cache::Cacheable;

use super::types::{Group, Project, Student, Task};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Project {
  fn entity_type() -> &'static str {
    "project"
  }
}

impl Cacheable for Group {
  fn entity_type() -> &'static str {
    "group"
  }
}

impl Cacheable for Task {
  fn entity_type() -> &'static str {
    "task"
  }
}

impl Cacheable for Student {
  fn entity_type() -> &'static str {
    "student"
  }
}

// ============================================================================
// Resource kinds
// ============================================================================

/// Collections the backend serves, one cache each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ResourceKind {
  Projects,
  Groups,
  Tasks,
  Students,
}

impl ResourceKind {
  /// Collection endpoint, relative to the API base URL
  pub fn path(&self) -> &'static str {
    match self {
      ResourceKind::Projects => "projects/",
      ResourceKind::Groups => "groups/",
      ResourceKind::Tasks => "tasks/",
      ResourceKind::Students => "users/get-all",
    }
  }

  /// Storage key of the collection's cache entry
  pub fn key(&self) -> &'static str {
    match self {
      ResourceKind::Projects => "projects",
      ResourceKind::Groups => "groups",
      ResourceKind::Tasks => "tasks",
      ResourceKind::Students => "students",
    }
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.key())
  }
}
