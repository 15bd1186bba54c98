//! Data-source abstraction.
//!
//! Every operation the desk performs against its backing data goes through
//! [`DataSource`]. Three implementations exist:
//! - [`RestSource`]: the REST backend,
//! - [`MemorySource`]: the in-memory store that stands in when the backend
//!   is down,
//! - [`FallbackSource`]: tries one source and falls back to another on any
//!   error.

pub mod fallback;
pub mod memory;
pub mod rest;

pub use fallback::FallbackSource;
pub use memory::MemorySource;
pub use rest::RestSource;

use std::sync::Arc;
use std::time::Duration;

use crate::error::ServiceResult;
use crate::settings::Settings;
use crate::types::{
    NewNote, NewTask, NewUser, Note, NoteCategory, NotePatch, Task, TaskPatch, TaskStatus, User,
    UserPatch, UserRole,
};

/// CRUD surface over tasks, notes and users.
///
/// Calls are blocking. Async callers should hop onto a blocking thread.
pub trait DataSource: Send + Sync {
    /// Short label used in log lines.
    fn name(&self) -> &'static str;

    fn list_tasks(&self) -> ServiceResult<Vec<Task>>;
    fn tasks_by_user(&self, user_id: &str) -> ServiceResult<Vec<Task>>;
    fn get_task(&self, id: &str) -> ServiceResult<Task>;
    fn create_task(&self, task: &NewTask) -> ServiceResult<Task>;
    fn update_task(&self, id: &str, patch: &TaskPatch) -> ServiceResult<Task>;
    fn delete_task(&self, id: &str) -> ServiceResult<()>;
    /// `None` clears the assignee.
    fn assign_task(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Task>;
    fn set_task_status(&self, id: &str, status: TaskStatus) -> ServiceResult<Task>;

    fn list_notes(&self) -> ServiceResult<Vec<Note>>;
    fn notes_by_category(&self, category: NoteCategory) -> ServiceResult<Vec<Note>>;
    fn get_note(&self, id: &str) -> ServiceResult<Note>;
    fn create_note(&self, note: &NewNote) -> ServiceResult<Note>;
    fn update_note(&self, id: &str, patch: &NotePatch) -> ServiceResult<Note>;
    fn delete_note(&self, id: &str) -> ServiceResult<()>;
    fn set_note_category(&self, id: &str, category: NoteCategory) -> ServiceResult<Note>;

    fn list_users(&self) -> ServiceResult<Vec<User>>;
    fn get_user(&self, id: &str) -> ServiceResult<User>;
    fn create_user(&self, user: &NewUser) -> ServiceResult<User>;
    fn update_user(&self, id: &str, patch: &UserPatch) -> ServiceResult<User>;
    fn delete_user(&self, id: &str) -> ServiceResult<()>;
    fn set_user_role(&self, id: &str, role: UserRole) -> ServiceResult<User>;
}

/// Assemble the source the settings ask for: the fallback store alone in
/// offline mode, otherwise the REST backend backed by the fallback store.
pub fn from_settings(settings: &Settings) -> ServiceResult<Arc<dyn DataSource>> {
    let memory = match &settings.store_file {
        Some(path) => MemorySource::open(path)?,
        None => MemorySource::seeded(),
    }
    .with_delay(Duration::from_millis(settings.mock_delay_ms));

    if settings.offline {
        tracing::info!("Offline mode: serving from the fallback store only");
        return Ok(Arc::new(memory));
    }

    let rest: RestSource = rest::create_rest_source(&settings.api_url)?;
    tracing::debug!(api_url = rest.base_url(), "Using REST backend with fallback store");
    Ok(Arc::new(FallbackSource::new(rest, memory)))
}
