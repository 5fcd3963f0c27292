//! Serde-deserializable types matching Academe API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. Every field is
//! optional: a missing or null field becomes an empty value rather than an
//! error. Only a record that is not an object, or a field of the wrong JSON
//! type, fails normalization.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::cache::NormalizationError;

use super::types::{
  Assignee, Evaluation, Group, GroupMember, MemberRole, Priority, Project, Report, Student, Task,
  TaskFile, TaskStatus,
};

const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";

/// Generated avatar for a display name.
pub fn avatar_url(name: &str) -> String {
  let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
  format!("{}?name={}&background=random", AVATAR_BASE_URL, encoded)
}

/// A raw backend record that maps into a domain entity.
pub trait ApiRecord: DeserializeOwned + Send + 'static {
  type Domain: Send + 'static;

  fn into_domain(self) -> Self::Domain;
}

/// Map a whole fetched collection. The first malformed record fails the batch.
pub fn normalize_all<A: ApiRecord>(
  resource: &str,
  records: Vec<Value>,
) -> Result<Vec<A::Domain>, NormalizationError> {
  records
    .into_iter()
    .enumerate()
    .map(|(index, record)| normalize_one::<A>(resource, index, record))
    .collect()
}

/// Map a single record; `index` is its position in the collection, if any.
pub fn normalize_one<A: ApiRecord>(
  resource: &str,
  index: usize,
  record: Value,
) -> Result<A::Domain, NormalizationError> {
  let parsed = if record.is_object() {
    serde_json::from_value::<A>(record).map_err(|e| e.to_string())
  } else {
    Err(format!("expected a JSON object, got {}", json_kind(&record)))
  };

  parsed.map(A::into_domain).map_err(|message| {
    warn!(resource, index, error = %message, "Malformed record");
    NormalizationError {
      resource: resource.to_string(),
      index,
      message,
    }
  })
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

// ============================================================================
// Users (mentors, group members, assigned students)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiUser {
  pub id: Option<String>,
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub ho_ten: Option<String>,
  pub name: Option<String>,
  pub email: Option<String>,
  pub group_id: Option<String>,
}

impl ApiUser {
  /// Backend endpoints disagree on `id` vs `_id`.
  fn user_id(&self) -> String {
    self
      .id
      .clone()
      .or_else(|| self.object_id.clone())
      .unwrap_or_default()
  }

  fn display_name(&self) -> Option<String> {
    self.ho_ten.clone().or_else(|| self.name.clone())
  }

  fn into_member(self, leader_id: &str) -> GroupMember {
    let id = self.user_id();
    let name = self.display_name().unwrap_or_default();
    let role = if !id.is_empty() && id == leader_id {
      MemberRole::Leader
    } else {
      MemberRole::Member
    };

    GroupMember {
      avatar: avatar_url(&name),
      email: self.email.unwrap_or_default(),
      id,
      name,
      role,
    }
  }

  fn into_assignee(self) -> Assignee {
    let id = self.user_id();
    let name = self
      .display_name()
      .filter(|n| !n.is_empty())
      .unwrap_or_else(|| "Unnamed".to_string());

    Assignee {
      avatar: avatar_url(&name),
      id,
      name,
    }
  }
}

impl ApiRecord for ApiUser {
  type Domain = Student;

  fn into_domain(self) -> Student {
    let id = self.user_id();
    let name = self.display_name().unwrap_or_default();

    Student {
      avatar: avatar_url(&name),
      email: self.email.unwrap_or_default(),
      group_id: self.group_id,
      id,
      name,
    }
  }
}

// ============================================================================
// Projects - GET /projects/
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiProject {
  pub id: Option<String>,
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub title: Option<String>,
  pub description: Option<String>,
  pub mentor: Option<ApiUser>,
  pub status: Option<String>,
  pub tags: Option<Vec<String>>,
}

impl ApiRecord for ApiProject {
  type Domain = Project;

  fn into_domain(self) -> Project {
    let (mentor_id, mentor_name) = match &self.mentor {
      Some(mentor) => (mentor.user_id(), mentor.display_name().unwrap_or_default()),
      None => (String::new(), String::new()),
    };

    Project {
      id: self.object_id.or(self.id).unwrap_or_default(),
      title: self.title.unwrap_or_default(),
      description: self.description.unwrap_or_default(),
      mentor_id,
      mentor_name,
      status: self
        .status
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "open".to_string()),
      tags: self.tags.unwrap_or_default(),
    }
  }
}

// ============================================================================
// Groups - GET /groups/
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiGroup {
  pub id: Option<String>,
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub name: Option<String>,
  pub leader_id: Option<String>,
  pub leader_name: Option<String>,
  pub project_id: Option<String>,
  pub project_title: Option<String>,
  pub project_description: Option<String>,
  pub members: Option<Vec<ApiUser>>,
}

impl ApiRecord for ApiGroup {
  type Domain = Group;

  fn into_domain(self) -> Group {
    let leader_id = self.leader_id.unwrap_or_default();
    let members = self
      .members
      .unwrap_or_default()
      .into_iter()
      .map(|m| m.into_member(&leader_id))
      .collect();

    Group {
      id: self.id.or(self.object_id).unwrap_or_default(),
      name: self.name.unwrap_or_default(),
      leader_name: self.leader_name.unwrap_or_default(),
      project_id: self.project_id.unwrap_or_default(),
      project_title: self.project_title.unwrap_or_default(),
      project_description: self.project_description,
      leader_id,
      members,
    }
  }
}

// ============================================================================
// Tasks - GET /tasks/ and GET /tasks/{id}
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiTask {
  pub id: Option<String>,
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub title: Option<String>,
  pub description: Option<String>,
  pub status: Option<String>,
  pub group_id: Option<String>,
  pub group_name: Option<String>,
  /// Single-task responses nest the group instead of flattening it
  pub group: Option<ApiRef>,
  pub priority: Option<String>,
  pub deadline: Option<String>,
  pub created_at: Option<String>,
  pub assigned_students: Option<Vec<ApiUser>>,
}

impl ApiRecord for ApiTask {
  type Domain = Task;

  fn into_domain(self) -> Task {
    let group = self.group.unwrap_or_default();
    let group_id = self.group_id.or(group.id).unwrap_or_default();

    Task {
      id: self.id.or(self.object_id).unwrap_or_default(),
      title: self.title.unwrap_or_default(),
      description: self.description.unwrap_or_default(),
      status: TaskStatus::from_api(self.status.as_deref().unwrap_or_default()),
      priority: Priority::from_api(self.priority.as_deref().unwrap_or_default()),
      due_date: self.deadline,
      assignees: self
        .assigned_students
        .unwrap_or_default()
        .into_iter()
        .map(ApiUser::into_assignee)
        .collect(),
      // Tasks only know their group; the group stands in for the project
      project_id: group_id.clone(),
      project_title: self.group_name.or(group.name).unwrap_or_default(),
      created_at: self.created_at,
      group_id,
    }
  }
}

/// Embedded reference to another record: a group, task or project.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiRef {
  pub id: Option<String>,
  pub name: Option<String>,
  pub title: Option<String>,
}

// ============================================================================
// Reports - /reports/
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiReport {
  pub id: Option<String>,
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub content: Option<String>,
  pub task: Option<ApiRef>,
  pub created_at: Option<String>,
  pub student: Option<ApiUser>,
}

impl ApiRecord for ApiReport {
  type Domain = Report;

  fn into_domain(self) -> Report {
    let task = self.task.unwrap_or_default();

    Report {
      id: self.id.or(self.object_id).unwrap_or_default(),
      content: self.content.unwrap_or_default(),
      task_id: task.id.unwrap_or_default(),
      task_title: task.title.unwrap_or_default(),
      created_at: self.created_at,
      student_name: self.student.and_then(|s| s.display_name()),
    }
  }
}

// ============================================================================
// Evaluations - /evaluations/
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiEvaluation {
  pub id: Option<String>,
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub evaluator: Option<ApiUser>,
  pub student: Option<ApiUser>,
  pub project: Option<ApiRef>,
  pub score: Option<f64>,
  pub comment: Option<String>,
}

impl ApiRecord for ApiEvaluation {
  type Domain = Evaluation;

  fn into_domain(self) -> Evaluation {
    let student = self.student.unwrap_or_default();
    let project = self.project.unwrap_or_default();

    Evaluation {
      id: self.id.or(self.object_id).unwrap_or_default(),
      evaluator_name: self
        .evaluator
        .and_then(|e| e.display_name())
        .unwrap_or_default(),
      student_id: student.user_id(),
      student_name: student.display_name().unwrap_or_default(),
      project_id: project.id.unwrap_or_default(),
      project_title: project.title.unwrap_or_default(),
      score: self.score,
      comment: self.comment,
    }
  }
}

// ============================================================================
// Task files - /upload/tasks/{id}/list-files/
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiTaskFile {
  pub filename: Option<String>,
  pub uploaded_at: Option<String>,
}

/// The listing wraps its files in an object
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiTaskFiles {
  pub files: Option<Vec<ApiTaskFile>>,
}

impl ApiRecord for ApiTaskFiles {
  type Domain = Vec<TaskFile>;

  fn into_domain(self) -> Vec<TaskFile> {
    self
      .files
      .unwrap_or_default()
      .into_iter()
      .map(|f| TaskFile {
        filename: f.filename.unwrap_or_default(),
        uploaded_at: f.uploaded_at.unwrap_or_default(),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_group_roles_follow_leader_id() {
    let raw = vec![json!({
      "id": "g1",
      "leader_id": "u1",
      "members": [
        { "id": "u1", "ho_ten": "An" },
        { "id": "u2", "ho_ten": "Binh" }
      ]
    })];

    let groups = normalize_all::<ApiGroup>("groups", raw).unwrap();
    let group = &groups[0];

    assert_eq!(group.id, "g1");
    assert_eq!(group.members[0].id, "u1");
    assert_eq!(group.members[0].role, MemberRole::Leader);
    assert_eq!(group.members[1].id, "u2");
    assert_eq!(group.members[1].role, MemberRole::Member);
    assert_eq!(group.leader().map(|m| m.name.as_str()), Some("An"));
  }

  #[test]
  fn test_group_without_leader_has_only_members() {
    let raw = vec![json!({
      "id": "g1",
      "members": [{ "id": "u1", "ho_ten": "An" }, { "ho_ten": "No Id" }]
    })];

    let group = normalize_all::<ApiGroup>("groups", raw).unwrap().remove(0);
    assert!(group.members.iter().all(|m| m.role == MemberRole::Member));
    assert!(group.leader().is_none());
  }

  #[test]
  fn test_group_members_accept_object_id() {
    let raw = vec![json!({
      "id": "g1",
      "leader_id": "u9",
      "members": [{ "_id": "u9", "ho_ten": "Chi", "email": "chi@example.com" }]
    })];

    let group = normalize_all::<ApiGroup>("groups", raw).unwrap().remove(0);
    assert_eq!(group.members[0].id, "u9");
    assert_eq!(group.members[0].email, "chi@example.com");
    assert_eq!(group.members[0].role, MemberRole::Leader);
    assert!(group.has_member("u9"));
  }

  #[test]
  fn test_project_mapping() {
    let raw = vec![json!({
      "_id": "p1",
      "id": "p1",
      "title": "Compilers",
      "description": "Build one",
      "mentor": { "_id": "m1", "ho_ten": "Dung" },
      "tags": ["rust"],
      "status": "Open"
    })];

    let project = normalize_all::<ApiProject>("projects", raw)
      .unwrap()
      .remove(0);
    assert_eq!(project.id, "p1");
    assert_eq!(project.mentor_id, "m1");
    assert_eq!(project.mentor_name, "Dung");
    assert_eq!(project.status, "open");
    assert_eq!(project.tags, vec!["rust".to_string()]);
  }

  #[test]
  fn test_missing_fields_become_empty() {
    let raw = vec![json!({ "title": null, "mentor": null })];

    let project = normalize_all::<ApiProject>("projects", raw)
      .unwrap()
      .remove(0);
    assert_eq!(project.id, "");
    assert_eq!(project.title, "");
    assert_eq!(project.mentor_name, "");
    assert_eq!(project.status, "open");
    assert!(project.tags.is_empty());
  }

  #[test]
  fn test_task_mapping() {
    let raw = vec![json!({
      "id": "t1",
      "title": "Write parser",
      "status": "in-progress",
      "priority": "high",
      "group_id": "g1",
      "group_name": "Team A",
      "deadline": "2025-05-01T00:00:00",
      "assigned_students": [
        { "id": "u1", "ho_ten": "An" },
        { "id": "u2", "name": "Binh" },
        { "id": "u3" }
      ]
    })];

    let task = normalize_all::<ApiTask>("tasks", raw).unwrap().remove(0);
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.project_id, "g1");
    assert_eq!(task.project_title, "Team A");
    assert_eq!(task.due_date.as_deref(), Some("2025-05-01T00:00:00"));
    let names: Vec<&str> = task.assignees.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["An", "Binh", "Unnamed"]);
    assert!(task.is_assigned_to("u2"));
  }

  #[test]
  fn test_task_with_nested_group() {
    let raw = json!({
      "id": "t1",
      "title": "Write parser",
      "status": "review",
      "group": { "id": "g1", "name": "Team A" },
      "related_to_project": { "id": "p1", "title": "Compilers" },
      "assigned_students": [{ "id": "u1", "ho_ten": "An" }]
    });

    let task = normalize_one::<ApiTask>("tasks", 0, raw).unwrap();
    assert_eq!(task.group_id, "g1");
    assert_eq!(task.project_id, "g1");
    assert_eq!(task.project_title, "Team A");
    assert_eq!(task.status, TaskStatus::Review);
  }

  #[test]
  fn test_task_flat_group_wins_over_nested() {
    let raw = json!({
      "id": "t1",
      "group_id": "g2",
      "group_name": "Team B",
      "group": { "id": "g1", "name": "Team A" }
    });

    let task = normalize_one::<ApiTask>("tasks", 0, raw).unwrap();
    assert_eq!(task.group_id, "g2");
    assert_eq!(task.project_title, "Team B");
  }

  #[test]
  fn test_task_unknown_status_and_priority() {
    let raw = vec![json!({ "id": "t1", "status": "blocked" })];

    let task = normalize_all::<ApiTask>("tasks", raw).unwrap().remove(0);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.priority, Priority::Medium);
    assert!(task.assignees.is_empty());
  }

  #[test]
  fn test_student_mapping() {
    let raw = vec![json!({
      "id": "u1",
      "ho_ten": "Nguyen Van An",
      "email": "an@example.com",
      "group_id": "g1"
    })];

    let student = normalize_all::<ApiUser>("students", raw).unwrap().remove(0);
    assert_eq!(student.name, "Nguyen Van An");
    assert_eq!(student.group_id.as_deref(), Some("g1"));
    assert_eq!(
      student.avatar,
      "https://ui-avatars.com/api/?name=Nguyen+Van+An&background=random"
    );
  }

  #[test]
  fn test_non_object_record_fails_batch() {
    let raw = vec![json!({ "id": "g1" }), json!("oops")];

    let err = normalize_all::<ApiGroup>("groups", raw).unwrap_err();
    assert_eq!(err.resource, "groups");
    assert_eq!(err.index, 1);
    assert!(err.message.contains("a string"));
  }

  #[test]
  fn test_wrong_field_type_fails_batch() {
    let raw = vec![json!({ "id": "g1", "members": "u1,u2" })];

    let err = normalize_all::<ApiGroup>("groups", raw).unwrap_err();
    assert_eq!(err.index, 0);
  }

  #[test]
  fn test_avatar_url_encodes_name() {
    assert_eq!(
      avatar_url("Trần Bình"),
      "https://ui-avatars.com/api/?name=Tr%E1%BA%A7n+B%C3%ACnh&background=random"
    );
  }

  #[test]
  fn test_report_mapping() {
    let raw = json!({
      "id": "r1",
      "content": "Done with lexer",
      "task": { "id": "t1", "title": "Write parser" },
      "student": { "id": "u1", "ho_ten": "An" }
    });

    let report = normalize_one::<ApiReport>("reports", 0, raw).unwrap();
    assert_eq!(report.task_id, "t1");
    assert_eq!(report.task_title, "Write parser");
    assert_eq!(report.student_name.as_deref(), Some("An"));
  }

  #[test]
  fn test_evaluation_mapping() {
    let raw = json!({
      "id": "e1",
      "evaluator": { "id": "u1", "ho_ten": "An" },
      "student": { "id": "u2", "ho_ten": "Binh", "email": "binh@example.com" },
      "project": { "id": "p1", "title": "Compilers", "description": "Build one" },
      "score": 8.5,
      "comment": null
    });

    let evaluation = normalize_one::<ApiEvaluation>("evaluations", 0, raw).unwrap();
    assert_eq!(evaluation.evaluator_name, "An");
    assert_eq!(evaluation.student_id, "u2");
    assert_eq!(evaluation.student_name, "Binh");
    assert_eq!(evaluation.project_title, "Compilers");
    assert_eq!(evaluation.score, Some(8.5));
    assert_eq!(evaluation.comment, None);
  }

  #[test]
  fn test_task_files_listing() {
    let raw = json!({
      "task_id": "t1",
      "files": [
        { "filename": "design.pdf", "uploaded_at": "2025-04-01 10:00:00" },
        { "filename": "notes.txt" }
      ]
    });

    let files = normalize_one::<ApiTaskFiles>("task files", 0, raw).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].filename, "design.pdf");
    assert_eq!(files[1].uploaded_at, "");
  }
}
