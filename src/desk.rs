//! Application operations shared by the CLI and the MCP server.
//!
//! # Responsibility
//! - Validate create/update input before it reaches the source.
//! - Compose source calls with the pure list operations in [`crate::query`].
//! - Provide the composite views: the task board and the assignment board.
//!
//! # Invariants
//! - The desk never caches: every call goes to the data source.
//! - The assignee sentinel [`UNASSIGNED`] clears an assignment.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::query::{
    NoteFilter, TaskFilter, TaskSort, TaskStats, filter_notes, filter_tasks, filter_users, sort_tasks,
    task_stats,
};
use crate::source::DataSource;
use crate::types::{
    NewNote, NewTask, NewUser, Note, NoteCategory, NotePatch, Task, TaskPatch, TaskStatus, User,
    UserPatch, UserRole,
};

/// Assignee value that means "nobody".
pub const UNASSIGNED: &str = "unassigned";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// A task together with the user it is assigned to, if that user exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assignment {
    pub task: Task,
    pub assignee: Option<User>,
}

#[derive(Clone)]
pub struct Desk {
    source: Arc<dyn DataSource>,
}

impl Desk {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    // Tasks

    pub fn task_board(&self, filter: &TaskFilter, sort: TaskSort) -> ServiceResult<Vec<Task>> {
        let tasks = match &filter.assigned_to {
            Some(user_id) => self.source.tasks_by_user(user_id)?,
            None => self.source.list_tasks()?,
        };
        let tasks = if filter.is_active() {
            filter_tasks(&tasks, filter)
        } else {
            tasks
        };
        Ok(sort_tasks(tasks, sort))
    }

    /// Status and priority counts, over every task or one user's tasks.
    pub fn task_stats(&self, assigned_to: Option<&str>) -> ServiceResult<TaskStats> {
        let tasks = match assigned_to {
            Some(user_id) => self.source.tasks_by_user(user_id)?,
            None => self.source.list_tasks()?,
        };
        Ok(task_stats(&tasks))
    }

    pub fn task(&self, id: &str) -> ServiceResult<Task> {
        self.source.get_task(id)
    }

    pub fn create_task(&self, mut task: NewTask) -> ServiceResult<Task> {
        task.title = required("title", &task.title)?;
        task.assigned_to = task.assigned_to.and_then(normalize_assignee);
        let created = self.source.create_task(&task)?;
        tracing::info!(id = %created.id, "Task created");
        Ok(created)
    }

    pub fn update_task(&self, id: &str, mut patch: TaskPatch) -> ServiceResult<Task> {
        if patch.is_empty() {
            return Err(ServiceError::Validation("nothing to update".to_string()));
        }
        if let Some(title) = &patch.title {
            patch.title = Some(required("title", title)?);
        }
        if let Some(assigned_to) = patch.assigned_to.take() {
            patch.assigned_to = Some(assigned_to.and_then(normalize_assignee));
        }
        self.source.update_task(id, &patch)
    }

    pub fn delete_task(&self, id: &str) -> ServiceResult<()> {
        self.source.delete_task(id)?;
        tracing::info!(%id, "Task deleted");
        Ok(())
    }

    /// Mark a task done. This is what the swipe gesture did.
    pub fn complete_task(&self, id: &str) -> ServiceResult<Task> {
        self.source.update_task(id, &TaskPatch::status(TaskStatus::Done))
    }

    pub fn set_task_status(&self, id: &str, status: TaskStatus) -> ServiceResult<Task> {
        self.source.set_task_status(id, status)
    }

    /// Assign `id` to `user_id`; `None`, blank or [`UNASSIGNED`] clears it.
    pub fn assign_task(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Task> {
        let user_id = user_id.map(str::to_string).and_then(normalize_assignee);
        let task = self.source.assign_task(id, user_id.as_deref())?;
        tracing::info!(task = %id, user = ?user_id, "Task assignment changed");
        Ok(task)
    }

    /// Every task with its assignee resolved. Ids that match no user resolve
    /// to `None`.
    pub fn assignment_board(&self) -> ServiceResult<Vec<Assignment>> {
        let tasks = self.source.list_tasks()?;
        let users = self.source.list_users()?;
        Ok(tasks
            .into_iter()
            .map(|task| {
                let assignee = task
                    .assigned_to
                    .as_deref()
                    .and_then(|id| users.iter().find(|u| u.id == id))
                    .cloned();
                Assignment { task, assignee }
            })
            .collect())
    }

    // Notes

    pub fn note_board(&self, filter: &NoteFilter) -> ServiceResult<Vec<Note>> {
        let notes = match filter.category {
            Some(category) => self.source.notes_by_category(category)?,
            None => self.source.list_notes()?,
        };
        if !filter.is_active() {
            return Ok(notes);
        }
        Ok(filter_notes(&notes, filter))
    }

    pub fn note(&self, id: &str) -> ServiceResult<Note> {
        self.source.get_note(id)
    }

    pub fn create_note(&self, mut note: NewNote) -> ServiceResult<Note> {
        note.title = required("title", &note.title)?;
        if note.content.trim().is_empty() {
            return Err(ServiceError::Validation("content is required".to_string()));
        }
        let created = self.source.create_note(&note)?;
        tracing::info!(id = %created.id, "Note created");
        Ok(created)
    }

    pub fn update_note(&self, id: &str, mut patch: NotePatch) -> ServiceResult<Note> {
        if patch.is_empty() {
            return Err(ServiceError::Validation("nothing to update".to_string()));
        }
        if let Some(title) = &patch.title {
            patch.title = Some(required("title", title)?);
        }
        if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ServiceError::Validation("content is required".to_string()));
        }
        self.source.update_note(id, &patch)
    }

    pub fn delete_note(&self, id: &str) -> ServiceResult<()> {
        self.source.delete_note(id)?;
        tracing::info!(%id, "Note deleted");
        Ok(())
    }

    pub fn set_note_category(&self, id: &str, category: NoteCategory) -> ServiceResult<Note> {
        self.source.set_note_category(id, category)
    }

    // Users

    pub fn users(&self, role: Option<UserRole>) -> ServiceResult<Vec<User>> {
        Ok(filter_users(&self.source.list_users()?, role))
    }

    pub fn user(&self, id: &str) -> ServiceResult<User> {
        self.source.get_user(id)
    }

    pub fn create_user(&self, mut user: NewUser) -> ServiceResult<User> {
        user.name = required("name", &user.name)?;
        user.email = valid_email(&user.email)?;
        let created = self.source.create_user(&user)?;
        tracing::info!(id = %created.id, "User created");
        Ok(created)
    }

    pub fn update_user(&self, id: &str, mut patch: UserPatch) -> ServiceResult<User> {
        if patch.is_empty() {
            return Err(ServiceError::Validation("nothing to update".to_string()));
        }
        if let Some(name) = &patch.name {
            patch.name = Some(required("name", name)?);
        }
        if let Some(email) = &patch.email {
            patch.email = Some(valid_email(email)?);
        }
        self.source.update_user(id, &patch)
    }

    pub fn delete_user(&self, id: &str) -> ServiceResult<()> {
        self.source.delete_user(id)?;
        tracing::info!(%id, "User deleted");
        Ok(())
    }

    pub fn set_user_role(&self, id: &str, role: UserRole) -> ServiceResult<User> {
        self.source.set_user_role(id, role)
    }
}

fn required(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn valid_email(value: &str) -> ServiceResult<String> {
    let email = required("email", value)?;
    if !EMAIL_RE.is_match(&email) {
        return Err(ServiceError::Validation(format!("'{email}' is not a valid email address")));
    }
    Ok(email)
}

fn normalize_assignee(user_id: String) -> Option<String> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNASSIGNED) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
