//! Task status workflow.
//!
//! Assignees move their own tasks forward one step at a time
//! (todo -> in-progress -> review -> completed). Dragging a task to an
//! arbitrary column on the board is reserved for group leaders.

use thiserror::Error;

use super::types::{MemberRole, Task, TaskStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
  #[error("user {user_id} is not assigned to task {task_id}")]
  NotAssigned { task_id: String, user_id: String },

  #[error("task {task_id} cannot advance from {status}")]
  Final { task_id: String, status: TaskStatus },
}

/// The status an assignee's next step leads to, if any.
pub fn next_status(status: TaskStatus) -> Option<TaskStatus> {
  match status {
    TaskStatus::Todo => Some(TaskStatus::InProgress),
    TaskStatus::InProgress => Some(TaskStatus::Review),
    TaskStatus::Review => Some(TaskStatus::Completed),
    TaskStatus::Completed | TaskStatus::Pending => None,
  }
}

/// Label of the primary action on a task card.
pub fn action_label(status: TaskStatus) -> &'static str {
  match status {
    TaskStatus::Todo => "Start Task",
    TaskStatus::InProgress => "Submit for Review",
    TaskStatus::Review => "Mark as Completed",
    TaskStatus::Completed | TaskStatus::Pending => "View Details",
  }
}

/// Check that `user_id` may advance `task`, and return the new status.
pub fn advance(task: &Task, user_id: &str) -> Result<TaskStatus, WorkflowError> {
  let next = next_status(task.status).ok_or_else(|| WorkflowError::Final {
    task_id: task.id.clone(),
    status: task.status,
  })?;

  if !task.is_assigned_to(user_id) {
    return Err(WorkflowError::NotAssigned {
      task_id: task.id.clone(),
      user_id: user_id.to_string(),
    });
  }

  Ok(next)
}

/// Whether a user with `role` may drag a task from one board column to another.
pub fn can_move(role: MemberRole, from: TaskStatus, to: TaskStatus) -> bool {
  from == to || role == MemberRole::Leader
}
