use serde::{Deserialize, Serialize};
use std::fmt;

/// Project offered by a mentor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: String,
  pub title: String,
  pub description: String,
  pub mentor_id: String,
  pub mentor_name: String,
  pub status: String,
  pub tags: Vec<String>,
}

/// Role of a student inside a group, derived from the group's leader id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
  Leader,
  Member,
}

impl fmt::Display for MemberRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MemberRole::Leader => write!(f, "leader"),
      MemberRole::Member => write!(f, "member"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
  pub id: String,
  pub name: String,
  pub email: String,
  pub avatar: String,
  pub role: MemberRole,
}

/// Student group working on a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub id: String,
  pub name: String,
  pub leader_id: String,
  pub leader_name: String,
  pub project_id: String,
  pub project_title: String,
  pub project_description: Option<String>,
  pub members: Vec<GroupMember>,
}

impl Group {
  pub fn leader(&self) -> Option<&GroupMember> {
    self.members.iter().find(|m| m.role == MemberRole::Leader)
  }

  pub fn has_member(&self, user_id: &str) -> bool {
    self.members.iter().any(|m| m.id == user_id)
  }
}

/// Task status, in board column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
  Pending,
  Todo,
  InProgress,
  Review,
  Completed,
}

impl TaskStatus {
  /// Parse the backend's status string. Unknown values map to `Pending`.
  pub fn from_api(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "todo" => TaskStatus::Todo,
      "in-progress" | "in_progress" => TaskStatus::InProgress,
      "review" => TaskStatus::Review,
      "completed" => TaskStatus::Completed,
      _ => TaskStatus::Pending,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TaskStatus::Pending => "pending",
      TaskStatus::Todo => "todo",
      TaskStatus::InProgress => "in-progress",
      TaskStatus::Review => "review",
      TaskStatus::Completed => "completed",
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  Medium,
  High,
}

impl Priority {
  /// Parse the backend's priority string. Unknown or missing values map to `Medium`.
  pub fn from_api(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "low" => Priority::Low,
      "high" => Priority::High,
      _ => Priority::Medium,
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Priority::Low => write!(f, "low"),
      Priority::Medium => write!(f, "medium"),
      Priority::High => write!(f, "high"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
  pub id: String,
  pub name: String,
  pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub title: String,
  pub description: String,
  pub status: TaskStatus,
  pub group_id: String,
  pub priority: Priority,
  pub due_date: Option<String>,
  pub assignees: Vec<Assignee>,
  pub project_id: String,
  pub project_title: String,
  pub created_at: Option<String>,
}

impl Task {
  pub fn is_assigned_to(&self, user_id: &str) -> bool {
    self.assignees.iter().any(|a| a.id == user_id)
  }
}

/// Registered student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
  pub id: String,
  pub name: String,
  pub email: String,
  pub avatar: String,
  pub group_id: Option<String>,
}

/// Progress report a student filed against a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
  pub id: String,
  pub content: String,
  pub task_id: String,
  pub task_title: String,
  pub created_at: Option<String>,
  pub student_name: Option<String>,
}

/// Peer evaluation of a student's work on a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
  pub id: String,
  pub evaluator_name: String,
  pub student_id: String,
  pub student_name: String,
  pub project_id: String,
  pub project_title: String,
  pub score: Option<f64>,
  pub comment: Option<String>,
}

/// File attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFile {
  pub filename: String,
  pub uploaded_at: String,
}
