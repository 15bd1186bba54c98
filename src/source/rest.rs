//! REST backend client.
//!
//! Talks JSON to the task backend:
//! - `/api/tasks` (plus `/user/:id`, `/:id/assign`, `/:id/status`)
//! - `/api/notes` (plus `/category/:category`, `/:id/category`)
//! - `/api/users` (plus `/:id/role`)
//!
//! Transport failures become [`ServiceError::Network`], non-2xx answers
//! become [`ServiceError::Api`]. There is no timeout and no retry.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ServiceError, ServiceResult};
use crate::source::DataSource;
use crate::types::{
    NewNote, NewTask, NewUser, Note, NoteCategory, NotePatch, Task, TaskPatch, TaskStatus, User,
    UserPatch, UserRole,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub base_url: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// REST client for the task backend
pub struct RestSource {
    base_url: String,
    agent: ureq::Agent,
}

impl RestSource {
    pub fn new(config: RestConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn execute(&self, method: &str, path: &str, body: Option<&Value>) -> ServiceResult<ureq::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "Making API request");

        let request = self
            .agent
            .request(method, &url)
            .set("Content-Type", "application/json");
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(ServiceError::Api { status, url });
            }
            Err(ureq::Error::Transport(e)) => {
                return Err(ServiceError::Network(format!("Failed to reach {url}: {e}")));
            }
        };

        if response.status() < 200 || response.status() >= 300 {
            return Err(ServiceError::Api {
                status: response.status(),
                url,
            });
        }

        Ok(response)
    }

    fn send<T: DeserializeOwned>(&self, method: &str, path: &str, body: Option<&Value>) -> ServiceResult<T> {
        let response = self.execute(method, path, body)?;
        let url = response.get_url().to_string();
        let data = response
            .into_json::<T>()
            .map_err(|e| ServiceError::Network(format!("Failed to read response from {url}: {e}")))?;
        tracing::debug!(%url, "API response received");
        Ok(data)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        self.send("GET", path, None)
    }

    fn delete(&self, path: &str) -> ServiceResult<()> {
        self.execute("DELETE", path, None).map(|_| ())
    }
}

impl DataSource for RestSource {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn list_tasks(&self) -> ServiceResult<Vec<Task>> {
        self.get("/api/tasks")
    }

    fn tasks_by_user(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        self.get(&format!("/api/tasks/user/{user_id}"))
    }

    fn get_task(&self, id: &str) -> ServiceResult<Task> {
        self.get(&format!("/api/tasks/{id}"))
    }

    fn create_task(&self, task: &NewTask) -> ServiceResult<Task> {
        self.send("POST", "/api/tasks", Some(&serde_json::to_value(task)?))
    }

    fn update_task(&self, id: &str, patch: &TaskPatch) -> ServiceResult<Task> {
        self.send("PUT", &format!("/api/tasks/{id}"), Some(&serde_json::to_value(patch)?))
    }

    fn delete_task(&self, id: &str) -> ServiceResult<()> {
        self.delete(&format!("/api/tasks/{id}"))
    }

    fn assign_task(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Task> {
        self.send(
            "PATCH",
            &format!("/api/tasks/{id}/assign"),
            Some(&json!({ "assignedTo": user_id })),
        )
    }

    fn set_task_status(&self, id: &str, status: TaskStatus) -> ServiceResult<Task> {
        self.send(
            "PUT",
            &format!("/api/tasks/{id}/status"),
            Some(&json!({ "status": status })),
        )
    }

    fn list_notes(&self) -> ServiceResult<Vec<Note>> {
        self.get("/api/notes")
    }

    fn notes_by_category(&self, category: NoteCategory) -> ServiceResult<Vec<Note>> {
        self.get(&format!("/api/notes/category/{category}"))
    }

    fn get_note(&self, id: &str) -> ServiceResult<Note> {
        self.get(&format!("/api/notes/{id}"))
    }

    fn create_note(&self, note: &NewNote) -> ServiceResult<Note> {
        self.send("POST", "/api/notes", Some(&serde_json::to_value(note)?))
    }

    fn update_note(&self, id: &str, patch: &NotePatch) -> ServiceResult<Note> {
        // The backend trusts the client clock for `updatedAt`.
        let mut body = serde_json::to_value(patch)?;
        if let Value::Object(fields) = &mut body {
            fields.insert("updatedAt".to_string(), json!(Utc::now()));
        }
        self.send("PUT", &format!("/api/notes/{id}"), Some(&body))
    }

    fn delete_note(&self, id: &str) -> ServiceResult<()> {
        self.delete(&format!("/api/notes/{id}"))
    }

    fn set_note_category(&self, id: &str, category: NoteCategory) -> ServiceResult<Note> {
        self.send(
            "PUT",
            &format!("/api/notes/{id}/category"),
            Some(&json!({ "category": category })),
        )
    }

    fn list_users(&self) -> ServiceResult<Vec<User>> {
        self.get("/api/users")
    }

    fn get_user(&self, id: &str) -> ServiceResult<User> {
        self.get(&format!("/api/users/{id}"))
    }

    fn create_user(&self, user: &NewUser) -> ServiceResult<User> {
        self.send("POST", "/api/users", Some(&serde_json::to_value(user)?))
    }

    fn update_user(&self, id: &str, patch: &UserPatch) -> ServiceResult<User> {
        self.send("PUT", &format!("/api/users/{id}"), Some(&serde_json::to_value(patch)?))
    }

    fn delete_user(&self, id: &str) -> ServiceResult<()> {
        self.delete(&format!("/api/users/{id}"))
    }

    fn set_user_role(&self, id: &str, role: UserRole) -> ServiceResult<User> {
        self.send(
            "PUT",
            &format!("/api/users/{id}/role"),
            Some(&json!({ "role": role })),
        )
    }
}

/// Build a REST source from a connection string such as `localhost:8080`
/// or `https://tasks.example.com/`.
pub fn create_rest_source(connection_string: &str) -> ServiceResult<RestSource> {
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Config("API URL cannot be empty".to_string()));
    }
    let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    Ok(RestSource::new(RestConfig { base_url }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// Serves exactly one HTTP exchange and hands back the raw request.
    pub(crate) fn stub_backend(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (format!("http://{addr}"), handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (key, value) = line.split_once(':')?;
                        if key.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// An address nothing is listening on.
    pub(crate) fn dead_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[test]
    fn test_connection_string_parsing() {
        let source = create_rest_source("localhost:8080").unwrap();
        assert_eq!(source.base_url(), "http://localhost:8080");

        let source = create_rest_source("https://tasks.example.com/").unwrap();
        assert_eq!(source.base_url(), "https://tasks.example.com");

        assert!(matches!(create_rest_source("  "), Err(ServiceError::Config(_))));
    }

    #[test]
    fn list_tasks_decodes_backend_payload() {
        let (url, backend) = stub_backend(
            "200 OK",
            r#"[{"id":"7","title":"Remote","description":"","status":"done","priority":"low","dueDate":null,"image":null,"assignedTo":null}]"#,
        );
        let source = RestSource::new(RestConfig { base_url: url });

        let tasks = source.list_tasks().unwrap();
        let request = backend.join().unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "7");
        assert_eq!(tasks[0].status, TaskStatus::Done);
        assert!(request.starts_with("GET /api/tasks HTTP/1.1"));
    }

    #[test]
    fn assign_sends_explicit_null_to_unassign() {
        let (url, backend) = stub_backend(
            "200 OK",
            r#"{"id":"3","title":"Review","status":"pending","priority":"medium","assignedTo":null}"#,
        );
        let source = RestSource::new(RestConfig { base_url: url });

        let task = source.assign_task("3", None).unwrap();
        let request = backend.join().unwrap();

        assert_eq!(task.assigned_to, None);
        assert!(request.starts_with("PATCH /api/tasks/3/assign HTTP/1.1"));
        assert!(request.contains(r#"{"assignedTo":null}"#));
    }

    #[test]
    fn update_note_stamps_updated_at() {
        let (url, backend) = stub_backend(
            "200 OK",
            r#"{"id":"1","title":"t","content":"c","category":"idea","priority":"high","createdAt":"2025-01-01T00:00:00Z","updatedAt":"2025-01-02T00:00:00Z"}"#,
        );
        let source = RestSource::new(RestConfig { base_url: url });
        let patch = NotePatch {
            title: Some("t".into()),
            ..NotePatch::default()
        };

        source.update_note("1", &patch).unwrap();
        let request = backend.join().unwrap();

        assert!(request.starts_with("PUT /api/notes/1 HTTP/1.1"));
        assert!(request.contains("\"updatedAt\""));
    }

    const TASK_JSON: &str = r#"{"id":"2","title":"Reunión","status":"in-progress","priority":"high","dueDate":null,"image":null,"assignedTo":"2"}"#;
    const NOTE_JSON: &str = r#"{"id":"1","title":"t","content":"c","category":"meeting","priority":"high","createdAt":"2025-01-01T00:00:00Z","updatedAt":"2025-01-02T00:00:00Z"}"#;
    const USER_JSON: &str = r#"{"id":"3","name":"Roberto","email":"r@ejemplo.com","role":"manager"}"#;

    fn body_of(request: &str) -> &str {
        request.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
    }

    #[test]
    fn create_task_posts_camel_case_fields_without_id() {
        let (url, backend) = stub_backend("201 Created", TASK_JSON);
        let source = RestSource::new(RestConfig { base_url: url });
        let new = NewTask {
            title: "Reunión".into(),
            priority: crate::types::Priority::High,
            due_date: Some("2025-03-01T00:00:00Z".parse().unwrap()),
            assigned_to: Some("2".into()),
            ..NewTask::default()
        };

        let created = source.create_task(&new).unwrap();
        let request = backend.join().unwrap();

        assert_eq!(created.id, "2");
        assert!(request.starts_with("POST /api/tasks HTTP/1.1"));
        let body: Value = serde_json::from_str(body_of(&request)).unwrap();
        assert_eq!(body["title"], "Reunión");
        assert_eq!(body["priority"], "high");
        assert_eq!(body["assignedTo"], "2");
        assert_eq!(body["dueDate"], "2025-03-01T00:00:00Z");
        assert!(body.get("id").is_none());
        assert!(body.get("assigned_to").is_none());
    }

    #[test]
    fn tasks_by_user_hits_user_path() {
        let (url, backend) = stub_backend("200 OK", "[]");
        let source = RestSource::new(RestConfig { base_url: url });

        assert!(source.tasks_by_user("2").unwrap().is_empty());
        assert!(backend.join().unwrap().starts_with("GET /api/tasks/user/2 HTTP/1.1"));
    }

    #[test]
    fn set_task_status_puts_wire_name() {
        let (url, backend) = stub_backend("200 OK", TASK_JSON);
        let source = RestSource::new(RestConfig { base_url: url });

        let task = source.set_task_status("2", TaskStatus::InProgress).unwrap();
        let request = backend.join().unwrap();

        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(request.starts_with("PUT /api/tasks/2/status HTTP/1.1"));
        assert_eq!(body_of(&request), r#"{"status":"in-progress"}"#);
    }

    #[test]
    fn notes_by_category_uses_wire_name_in_path() {
        let (url, backend) = stub_backend("200 OK", "[]");
        let source = RestSource::new(RestConfig { base_url: url });

        source.notes_by_category(NoteCategory::Meeting).unwrap();
        assert!(
            backend
                .join()
                .unwrap()
                .starts_with("GET /api/notes/category/meeting HTTP/1.1")
        );
    }

    #[test]
    fn set_note_category_puts_category() {
        let (url, backend) = stub_backend("200 OK", NOTE_JSON);
        let source = RestSource::new(RestConfig { base_url: url });

        let note = source.set_note_category("1", NoteCategory::Meeting).unwrap();
        let request = backend.join().unwrap();

        assert_eq!(note.category, NoteCategory::Meeting);
        assert!(request.starts_with("PUT /api/notes/1/category HTTP/1.1"));
        assert_eq!(body_of(&request), r#"{"category":"meeting"}"#);
    }

    #[test]
    fn set_user_role_puts_role() {
        let (url, backend) = stub_backend("200 OK", USER_JSON);
        let source = RestSource::new(RestConfig { base_url: url });

        let user = source.set_user_role("3", UserRole::Manager).unwrap();
        let request = backend.join().unwrap();

        assert_eq!(user.role, UserRole::Manager);
        assert!(request.starts_with("PUT /api/users/3/role HTTP/1.1"));
        assert_eq!(body_of(&request), r#"{"role":"manager"}"#);
    }

    #[test]
    fn delete_accepts_no_content() {
        let (url, backend) = stub_backend("204 No Content", "");
        let source = RestSource::new(RestConfig { base_url: url });

        source.delete_task("4").unwrap();
        assert!(backend.join().unwrap().starts_with("DELETE /api/tasks/4 HTTP/1.1"));
    }

    #[test]
    fn delete_ignores_response_body() {
        let (url, backend) = stub_backend("200 OK", r#"{"ok":true}"#);
        let source = RestSource::new(RestConfig { base_url: url });

        source.delete_note("2").unwrap();
        assert!(backend.join().unwrap().starts_with("DELETE /api/notes/2 HTTP/1.1"));
    }

    #[test]
    fn non_success_status_is_an_api_error() {
        let (url, backend) = stub_backend("500 Internal Server Error", "{}");
        let source = RestSource::new(RestConfig { base_url: url });

        let err = source.get_user("1").unwrap_err();
        backend.join().unwrap();

        assert!(matches!(err, ServiceError::Api { status: 500, .. }));
    }

    #[test]
    fn unreachable_backend_is_a_network_error() {
        let source = RestSource::new(RestConfig {
            base_url: dead_address(),
        });
        assert!(matches!(source.list_notes(), Err(ServiceError::Network(_))));
    }
}
