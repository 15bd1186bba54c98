use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;
use ulid::Ulid;

use crate::error::{Entity, ServiceError, ServiceResult};
use crate::source::DataSource;
use crate::types::{
    NewNote, NewTask, NewUser, Note, NoteCategory, NotePatch, Priority, Task, TaskPatch,
    TaskStatus, User, UserPatch, UserRole,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    pub tasks: Vec<Task>,
    pub notes: Vec<Note>,
    pub users: Vec<User>,
}

impl StoreData {
    /// Demo dataset served while the backend is unreachable. Dates are
    /// relative to the moment of seeding.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let task = |id: &str,
                    title: &str,
                    description: &str,
                    status: TaskStatus,
                    priority: Priority,
                    due_in_days: i64,
                    assigned_to: Option<&str>| Task {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status,
            priority,
            due_date: Some(now + Duration::days(due_in_days)),
            image: None,
            assigned_to: assigned_to.map(str::to_string),
        };
        let note = |id: &str,
                    title: &str,
                    content: &str,
                    category: NoteCategory,
                    priority: Priority,
                    days_ago: i64| {
            let stamp = now - Duration::days(days_ago);
            Note {
                id: id.to_string(),
                title: title.to_string(),
                content: content.to_string(),
                category,
                priority,
                created_at: stamp,
                updated_at: stamp,
            }
        };
        let user = |id: &str,
                    name: &str,
                    email: &str,
                    role: UserRole,
                    department: &str,
                    position: &str| User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            avatar: None,
            department: department.to_string(),
            position: position.to_string(),
        };

        Self {
            tasks: vec![
                task(
                    "1",
                    "Completar propuesta de proyecto",
                    "Terminar el borrador y enviar para revisión",
                    TaskStatus::InProgress,
                    Priority::High,
                    1,
                    Some("2"),
                ),
                task(
                    "2",
                    "Reunión semanal de equipo",
                    "Discutir el progreso del proyecto y los próximos pasos",
                    TaskStatus::Pending,
                    Priority::High,
                    2,
                    None,
                ),
                task(
                    "3",
                    "Revisar comentarios del cliente",
                    "Revisar los comentarios y preparar respuestas",
                    TaskStatus::Pending,
                    Priority::Medium,
                    3,
                    Some("1"),
                ),
                task(
                    "4",
                    "Actualizar documentación",
                    "Añadir cambios recientes a la documentación del proyecto",
                    TaskStatus::Pending,
                    Priority::Low,
                    4,
                    None,
                ),
            ],
            notes: vec![
                note(
                    "1",
                    "Ideas para el nuevo proyecto",
                    "Implementar sistema de notificaciones push\nMejorar la interfaz de usuario\nAñadir modo oscuro",
                    NoteCategory::Idea,
                    Priority::High,
                    1,
                ),
                note(
                    "2",
                    "Reunión con el cliente",
                    "Revisar los requisitos del proyecto\nDiscutir el cronograma\nDefinir entregables",
                    NoteCategory::Meeting,
                    Priority::Medium,
                    2,
                ),
                note(
                    "3",
                    "Tareas pendientes",
                    "Comprar materiales de oficina\nProgramar mantenimiento del servidor\nActualizar documentación",
                    NoteCategory::Todo,
                    Priority::Low,
                    3,
                ),
            ],
            users: vec![
                user(
                    "1",
                    "Juan Pérez",
                    "juan.perez@ejemplo.com",
                    UserRole::Admin,
                    "Ingeniería",
                    "Desarrollador Senior",
                ),
                user(
                    "2",
                    "María García",
                    "maria.garcia@ejemplo.com",
                    UserRole::Manager,
                    "Marketing",
                    "Gerente de Marketing",
                ),
                user(
                    "3",
                    "Roberto Rodríguez",
                    "roberto.rodriguez@ejemplo.com",
                    UserRole::User,
                    "Ventas",
                    "Representante de Ventas",
                ),
            ],
        }
    }
}

/// In-memory stand-in for the REST backend.
///
/// Writes mutate the collections in place. With a snapshot path set, the
/// whole store is rewritten after every successful write.
pub struct MemorySource {
    data: Mutex<StoreData>,
    delay: StdDuration,
    snapshot_path: Option<PathBuf>,
}

impl MemorySource {
    pub fn new(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
            delay: StdDuration::ZERO,
            snapshot_path: None,
        }
    }

    pub fn seeded() -> Self {
        Self::new(StoreData::seeded())
    }

    /// Sleep this long before answering, to mimic network latency.
    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = delay;
        self
    }

    /// Load the store from `path` when it exists (seeding it otherwise) and
    /// persist every write back to it.
    pub fn open(path: impl Into<PathBuf>) -> ServiceResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let mut file = File::open(&path)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            serde_json::from_str(&contents)?
        } else {
            let data = StoreData::seeded();
            save_snapshot(&path, &data)?;
            data
        };
        tracing::debug!(path = %path.display(), "Loaded fallback store snapshot");

        Ok(Self {
            data: Mutex::new(data),
            delay: StdDuration::ZERO,
            snapshot_path: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        // A panic mid-write leaves plain data behind; keep serving it.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> MutexGuard<'_, StoreData> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.lock()
    }

    /// Apply `op`. With a snapshot path, the change is staged on a copy and
    /// only becomes visible once the snapshot is on disk.
    fn write<T>(&self, op: impl FnOnce(&mut StoreData) -> ServiceResult<T>) -> ServiceResult<T> {
        let mut data = self.read();
        let Some(path) = &self.snapshot_path else {
            return op(&mut data);
        };
        let mut staged = data.clone();
        let out = op(&mut staged)?;
        save_snapshot(path, &staged)?;
        *data = staged;
        Ok(out)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::seeded()
    }
}

/// Write the snapshot through a temporary file and an atomic rename so a
/// crash never leaves a half-written store behind.
fn save_snapshot(path: &Path, data: &StoreData) -> ServiceResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = path.with_extension("tmp");
    let mut f = File::create(&temp)?;
    let content = serde_json::to_string_pretty(data)?;
    f.write_all(content.as_bytes())?;
    f.sync_all()?;
    fs::rename(temp, path)?;
    Ok(())
}

fn new_id() -> String {
    Ulid::new().to_string()
}

fn find_mut<'a, T>(
    items: &'a mut [T],
    entity: Entity,
    id: &str,
    id_of: impl Fn(&T) -> &str,
) -> ServiceResult<&'a mut T> {
    items
        .iter_mut()
        .find(|item| id_of(item) == id)
        .ok_or_else(|| ServiceError::not_found(entity, id))
}

fn remove_one<T>(items: &mut Vec<T>, entity: Entity, id: &str, id_of: impl Fn(&T) -> &str) -> ServiceResult<T> {
    let index = items
        .iter()
        .position(|item| id_of(item) == id)
        .ok_or_else(|| ServiceError::not_found(entity, id))?;
    Ok(items.remove(index))
}

impl DataSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list_tasks(&self) -> ServiceResult<Vec<Task>> {
        Ok(self.read().tasks.clone())
    }

    fn tasks_by_user(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        Ok(self
            .read()
            .tasks
            .iter()
            .filter(|t| t.assigned_to.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    fn get_task(&self, id: &str) -> ServiceResult<Task> {
        self.read()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(Entity::Task, id))
    }

    fn create_task(&self, task: &NewTask) -> ServiceResult<Task> {
        self.write(|data| {
            let task = task.clone().into_task(new_id());
            data.tasks.push(task.clone());
            tracing::debug!(id = %task.id, "Mock task created");
            Ok(task)
        })
    }

    fn update_task(&self, id: &str, patch: &TaskPatch) -> ServiceResult<Task> {
        self.write(|data| {
            let task = find_mut(&mut data.tasks, Entity::Task, id, |t| t.id.as_str())?;
            patch.apply(task);
            Ok(task.clone())
        })
    }

    fn delete_task(&self, id: &str) -> ServiceResult<()> {
        self.write(|data| {
            let removed = remove_one(&mut data.tasks, Entity::Task, id, |t| t.id.as_str())?;
            tracing::debug!(id = %removed.id, "Mock task deleted");
            Ok(())
        })
    }

    fn assign_task(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Task> {
        self.write(|data| {
            let task = find_mut(&mut data.tasks, Entity::Task, id, |t| t.id.as_str())?;
            task.assigned_to = user_id.map(str::to_string);
            Ok(task.clone())
        })
    }

    fn set_task_status(&self, id: &str, status: TaskStatus) -> ServiceResult<Task> {
        self.write(|data| {
            let task = find_mut(&mut data.tasks, Entity::Task, id, |t| t.id.as_str())?;
            task.status = status;
            Ok(task.clone())
        })
    }

    fn list_notes(&self) -> ServiceResult<Vec<Note>> {
        Ok(self.read().notes.clone())
    }

    fn notes_by_category(&self, category: NoteCategory) -> ServiceResult<Vec<Note>> {
        Ok(self
            .read()
            .notes
            .iter()
            .filter(|n| n.category == category)
            .cloned()
            .collect())
    }

    fn get_note(&self, id: &str) -> ServiceResult<Note> {
        self.read()
            .notes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(Entity::Note, id))
    }

    fn create_note(&self, note: &NewNote) -> ServiceResult<Note> {
        self.write(|data| {
            let note = note.clone().into_note(new_id(), Utc::now());
            data.notes.push(note.clone());
            tracing::debug!(id = %note.id, "Mock note created");
            Ok(note)
        })
    }

    fn update_note(&self, id: &str, patch: &NotePatch) -> ServiceResult<Note> {
        self.write(|data| {
            let note = find_mut(&mut data.notes, Entity::Note, id, |n| n.id.as_str())?;
            patch.apply(note, Utc::now());
            Ok(note.clone())
        })
    }

    fn delete_note(&self, id: &str) -> ServiceResult<()> {
        self.write(|data| {
            let removed = remove_one(&mut data.notes, Entity::Note, id, |n| n.id.as_str())?;
            tracing::debug!(id = %removed.id, "Mock note deleted");
            Ok(())
        })
    }

    fn set_note_category(&self, id: &str, category: NoteCategory) -> ServiceResult<Note> {
        self.write(|data| {
            let note = find_mut(&mut data.notes, Entity::Note, id, |n| n.id.as_str())?;
            note.category = category;
            note.updated_at = Utc::now();
            Ok(note.clone())
        })
    }

    fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.read().users.clone())
    }

    fn get_user(&self, id: &str) -> ServiceResult<User> {
        self.read()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(Entity::User, id))
    }

    fn create_user(&self, user: &NewUser) -> ServiceResult<User> {
        self.write(|data| {
            let user = user.clone().into_user(new_id());
            data.users.push(user.clone());
            tracing::debug!(id = %user.id, "Mock user created");
            Ok(user)
        })
    }

    fn update_user(&self, id: &str, patch: &UserPatch) -> ServiceResult<User> {
        self.write(|data| {
            let user = find_mut(&mut data.users, Entity::User, id, |u| u.id.as_str())?;
            patch.apply(user);
            Ok(user.clone())
        })
    }

    fn delete_user(&self, id: &str) -> ServiceResult<()> {
        self.write(|data| {
            let removed = remove_one(&mut data.users, Entity::User, id, |u| u.id.as_str())?;
            tracing::debug!(id = %removed.id, "Mock user deleted");
            Ok(())
        })
    }

    fn set_user_role(&self, id: &str, role: UserRole) -> ServiceResult<User> {
        self.write(|data| {
            let user = find_mut(&mut data.users, Entity::User, id, |u| u.id.as_str())?;
            user.role = role;
            Ok(user.clone())
        })
    }
}
