use crate::error::ServiceResult;
use crate::source::DataSource;
use crate::types::{
    NewNote, NewTask, NewUser, Note, NoteCategory, NotePatch, Task, TaskPatch, TaskStatus, User,
    UserPatch, UserRole,
};

/// Serves each call from `primary`, or from `secondary` when `primary` fails
/// for any reason.
///
/// Nothing is remembered between calls: a failure diverts only the call that
/// hit it, and the next call tries `primary` again. Errors from `secondary`
/// are returned as they are.
pub struct FallbackSource<P, S> {
    primary: P,
    secondary: S,
}

impl<P: DataSource, S: DataSource> FallbackSource<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    #[cfg(test)]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    #[cfg(test)]
    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    fn attempt<T>(
        &self,
        op: &'static str,
        primary: impl FnOnce(&P) -> ServiceResult<T>,
        secondary: impl FnOnce(&S) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        match primary(&self.primary) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(
                    op,
                    from = self.primary.name(),
                    to = self.secondary.name(),
                    error = %e,
                    "Request failed, serving from fallback"
                );
                secondary(&self.secondary)
            }
        }
    }
}

/// `fallback!(self, op(args..))` runs `op` on the primary, then on the
/// secondary if needed.
macro_rules! fallback {
    ($self:ident, $op:ident($($arg:expr),*)) => {
        $self.attempt(stringify!($op), |s| s.$op($($arg),*), |s| s.$op($($arg),*))
    };
}

impl<P: DataSource, S: DataSource> DataSource for FallbackSource<P, S> {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn list_tasks(&self) -> ServiceResult<Vec<Task>> {
        fallback!(self, list_tasks())
    }

    fn tasks_by_user(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        fallback!(self, tasks_by_user(user_id))
    }

    fn get_task(&self, id: &str) -> ServiceResult<Task> {
        fallback!(self, get_task(id))
    }

    fn create_task(&self, task: &NewTask) -> ServiceResult<Task> {
        fallback!(self, create_task(task))
    }

    fn update_task(&self, id: &str, patch: &TaskPatch) -> ServiceResult<Task> {
        fallback!(self, update_task(id, patch))
    }

    fn delete_task(&self, id: &str) -> ServiceResult<()> {
        fallback!(self, delete_task(id))
    }

    fn assign_task(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Task> {
        fallback!(self, assign_task(id, user_id))
    }

    fn set_task_status(&self, id: &str, status: TaskStatus) -> ServiceResult<Task> {
        fallback!(self, set_task_status(id, status))
    }

    fn list_notes(&self) -> ServiceResult<Vec<Note>> {
        fallback!(self, list_notes())
    }

    fn notes_by_category(&self, category: NoteCategory) -> ServiceResult<Vec<Note>> {
        fallback!(self, notes_by_category(category))
    }

    fn get_note(&self, id: &str) -> ServiceResult<Note> {
        fallback!(self, get_note(id))
    }

    fn create_note(&self, note: &NewNote) -> ServiceResult<Note> {
        fallback!(self, create_note(note))
    }

    fn update_note(&self, id: &str, patch: &NotePatch) -> ServiceResult<Note> {
        fallback!(self, update_note(id, patch))
    }

    fn delete_note(&self, id: &str) -> ServiceResult<()> {
        fallback!(self, delete_note(id))
    }

    fn set_note_category(&self, id: &str, category: NoteCategory) -> ServiceResult<Note> {
        fallback!(self, set_note_category(id, category))
    }

    fn list_users(&self) -> ServiceResult<Vec<User>> {
        fallback!(self, list_users())
    }

    fn get_user(&self, id: &str) -> ServiceResult<User> {
        fallback!(self, get_user(id))
    }

    fn create_user(&self, user: &NewUser) -> ServiceResult<User> {
        fallback!(self, create_user(user))
    }

    fn update_user(&self, id: &str, patch: &UserPatch) -> ServiceResult<User> {
        fallback!(self, update_user(id, patch))
    }

    fn delete_user(&self, id: &str) -> ServiceResult<()> {
        fallback!(self, delete_user(id))
    }

    fn set_user_role(&self, id: &str, role: UserRole) -> ServiceResult<User> {
        fallback!(self, set_user_role(id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::source::rest::tests::{dead_address, stub_backend};
    use crate::source::rest::{RestConfig, RestSource};
    use crate::source::MemorySource;
    use crate::source::memory::StoreData;

    /// Primary that is always unreachable.
    struct Down;

    fn down<T>() -> ServiceResult<T> {
        Err(ServiceError::Network("connection refused".to_string()))
    }

    impl DataSource for Down {
        fn name(&self) -> &'static str {
            "down"
        }
        fn list_tasks(&self) -> ServiceResult<Vec<Task>> {
            down()
        }
        fn tasks_by_user(&self, _: &str) -> ServiceResult<Vec<Task>> {
            down()
        }
        fn get_task(&self, _: &str) -> ServiceResult<Task> {
            down()
        }
        fn create_task(&self, _: &NewTask) -> ServiceResult<Task> {
            down()
        }
        fn update_task(&self, _: &str, _: &TaskPatch) -> ServiceResult<Task> {
            down()
        }
        fn delete_task(&self, _: &str) -> ServiceResult<()> {
            down()
        }
        fn assign_task(&self, _: &str, _: Option<&str>) -> ServiceResult<Task> {
            down()
        }
        fn set_task_status(&self, _: &str, _: TaskStatus) -> ServiceResult<Task> {
            down()
        }
        fn list_notes(&self) -> ServiceResult<Vec<Note>> {
            down()
        }
        fn notes_by_category(&self, _: NoteCategory) -> ServiceResult<Vec<Note>> {
            down()
        }
        fn get_note(&self, _: &str) -> ServiceResult<Note> {
            down()
        }
        fn create_note(&self, _: &NewNote) -> ServiceResult<Note> {
            down()
        }
        fn update_note(&self, _: &str, _: &NotePatch) -> ServiceResult<Note> {
            down()
        }
        fn delete_note(&self, _: &str) -> ServiceResult<()> {
            down()
        }
        fn set_note_category(&self, _: &str, _: NoteCategory) -> ServiceResult<Note> {
            down()
        }
        fn list_users(&self) -> ServiceResult<Vec<User>> {
            down()
        }
        fn get_user(&self, _: &str) -> ServiceResult<User> {
            down()
        }
        fn create_user(&self, _: &NewUser) -> ServiceResult<User> {
            down()
        }
        fn update_user(&self, _: &str, _: &UserPatch) -> ServiceResult<User> {
            down()
        }
        fn delete_user(&self, _: &str) -> ServiceResult<()> {
            down()
        }
        fn set_user_role(&self, _: &str, _: UserRole) -> ServiceResult<User> {
            down()
        }
    }

    #[test]
    fn healthy_primary_leaves_fallback_untouched() {
        let source = FallbackSource::new(MemorySource::new(StoreData::default()), MemorySource::seeded());

        assert!(source.list_tasks().unwrap().is_empty());
        source
            .create_task(&NewTask {
                title: "Remote only".into(),
                ..NewTask::default()
            })
            .unwrap();

        assert_eq!(source.primary().list_tasks().unwrap().len(), 1);
        assert_eq!(source.secondary().list_tasks().unwrap().len(), 4);
    }

    #[test]
    fn failing_primary_diverts_reads_and_writes() {
        let source = FallbackSource::new(Down, MemorySource::seeded());

        assert_eq!(source.list_users().unwrap().len(), 3);
        let done = source.set_task_status("2", TaskStatus::Done).unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(
            source.secondary().get_task("2").unwrap().status,
            TaskStatus::Done
        );
    }

    #[test]
    fn fallback_errors_propagate() {
        let source = FallbackSource::new(Down, MemorySource::seeded());
        assert!(matches!(
            source.get_note("nope"),
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            source.delete_user("nope"),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn unreachable_backend_serves_demo_data() {
        let rest = RestSource::new(RestConfig {
            base_url: dead_address(),
        });
        let source = FallbackSource::new(rest, MemorySource::seeded());

        let notes = source.list_notes().unwrap();
        assert_eq!(notes.len(), 3);
    }

    #[test]
    fn server_error_status_also_falls_back() {
        let (url, backend) = stub_backend("503 Service Unavailable", "{}");
        let rest = RestSource::new(RestConfig { base_url: url });
        let source = FallbackSource::new(rest, MemorySource::seeded());

        let task = source.get_task("1").unwrap();
        backend.join().unwrap();
        assert_eq!(task.title, "Completar propuesta de proyecto");
    }

    #[test]
    fn every_call_retries_the_primary() {
        let (url, backend) = stub_backend("200 OK", "[]");
        let rest = RestSource::new(RestConfig { base_url: url });
        let source = FallbackSource::new(rest, MemorySource::seeded());

        // First call: the stub answers with an empty list.
        assert!(source.list_users().unwrap().is_empty());
        backend.join().unwrap();
        // Second call: the stub is gone, so the fallback answers.
        assert_eq!(source.list_users().unwrap().len(), 3);
    }
}
