//! Records exchanged with the REST backend and kept by the fallback store.
//!
//! Field names are camelCase on the wire. Nullable fields in the `*Patch`
//! types are `Option<Option<T>>`: the outer option says whether the field is
//! being changed at all, the inner one whether it is being cleared.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

wire_names!(TaskStatus {
    Pending => "pending",
    InProgress => "in-progress",
    Done => "done",
});

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

wire_names!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum NoteCategory {
    #[default]
    Todo,
    Idea,
    Reminder,
    Meeting,
    Personal,
}

wire_names!(NoteCategory {
    Todo => "todo",
    Idea => "idea",
    Reminder => "reminder",
    Meeting => "meeting",
    Personal => "personal",
});

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    Admin,
    Manager,
    #[default]
    User,
}

wire_names!(UserRole {
    Admin => "admin",
    Manager => "manager",
    User => "user",
});

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Data URL of an attached picture.
    #[serde(default)]
    pub image: Option<String>,
    /// Id of the assignee. Not checked against the user list.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl NewTask {
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            image: self.image,
            assigned_to: self.assigned_to,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<Option<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrites every field present in the patch.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(image) = &self.image {
            task.image = image.clone();
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: NoteCategory,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: NoteCategory,
    #[serde(default)]
    pub priority: Priority,
}

impl NewNote {
    pub fn into_note(self, id: String, now: DateTime<Utc>) -> Note {
        Note {
            id,
            title: self.title,
            content: self.content,
            category: self.category,
            priority: self.priority,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<NoteCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrites the present fields and stamps `updated_at`.
    pub fn apply(&self, note: &mut Note, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(category) = self.category {
            note.category = category;
        }
        if let Some(priority) = self.priority {
            note.priority = priority;
        }
        note.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
}

impl NewUser {
    pub fn into_user(self, id: String) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            role: self.role,
            avatar: self.avatar,
            department: self.department,
            position: self.position,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = avatar.clone();
        }
        if let Some(department) = &self.department {
            user.department = department.clone();
        }
        if let Some(position) = &self.position {
            user.position = position.clone();
        }
    }
}

/// Lets an explicit `null` deserialize as `Some(None)` instead of `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_wire_names_match_serde() {
        for status in TaskStatus::ALL {
            assert_eq!(json!(status), json!(status.as_str()));
        }
        for priority in Priority::ALL {
            assert_eq!(json!(priority), json!(priority.as_str()));
        }
        for category in NoteCategory::ALL {
            assert_eq!(json!(category), json!(category.as_str()));
        }
        for role in UserRole::ALL {
            assert_eq!(json!(role), json!(role.as_str()));
        }
    }

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!("In-Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn task_uses_camel_case_fields() {
        let task: Task = serde_json::from_value(json!({
            "id": "1",
            "title": "Completar propuesta de proyecto",
            "description": "Terminar el borrador",
            "status": "in-progress",
            "priority": "high",
            "dueDate": "2025-03-01T10:00:00.000Z",
            "image": null,
            "assignedTo": "2"
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assigned_to.as_deref(), Some("2"));
        assert!(task.due_date.is_some());

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["assignedTo"], json!("2"));
        assert!(value.get("assigned_to").is_none());
    }

    #[test]
    fn new_task_defaults_follow_the_create_form() {
        let new: NewTask = serde_json::from_value(json!({ "title": "Write docs" })).unwrap();
        assert_eq!(new.status, TaskStatus::Pending);
        assert_eq!(new.priority, Priority::Medium);
        assert_eq!(new.assigned_to, None);
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let clear: TaskPatch = serde_json::from_value(json!({ "assignedTo": null })).unwrap();
        assert_eq!(clear.assigned_to, Some(None));

        let untouched: TaskPatch = serde_json::from_value(json!({ "title": "x" })).unwrap();
        assert_eq!(untouched.assigned_to, None);

        assert_eq!(serde_json::to_value(&clear).unwrap(), json!({ "assignedTo": null }));
        assert_eq!(serde_json::to_value(&untouched).unwrap(), json!({ "title": "x" }));
    }

    #[test]
    fn task_patch_only_touches_present_fields() {
        let mut task = NewTask {
            title: "Old".into(),
            description: "keep me".into(),
            assigned_to: Some("1".into()),
            ..NewTask::default()
        }
        .into_task("t1".into());

        let patch = TaskPatch {
            title: Some("New".into()),
            assigned_to: Some(None),
            ..TaskPatch::default()
        };
        patch.apply(&mut task);

        assert_eq!(task.title, "New");
        assert_eq!(task.description, "keep me");
        assert_eq!(task.assigned_to, None);
        assert_eq!(task.id, "t1");
    }

    #[test]
    fn note_patch_bumps_updated_at() {
        let created = Utc::now() - chrono::Duration::days(1);
        let mut note = NewNote {
            title: "Idea".into(),
            content: "body".into(),
            ..NewNote::default()
        }
        .into_note("n1".into(), created);

        let now = Utc::now();
        NotePatch {
            category: Some(NoteCategory::Idea),
            ..NotePatch::default()
        }
        .apply(&mut note, now);

        assert_eq!(note.category, NoteCategory::Idea);
        assert_eq!(note.created_at, created);
        assert_eq!(note.updated_at, now);
    }
}
