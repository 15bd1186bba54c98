//! Pure list filtering and sorting.
//!
//! Nothing here touches a data source: every function takes records in and
//! hands records back. Sorting is stable, so records with equal keys keep
//! the order they arrived in.

use std::cmp::Ordering;

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::types::{Note, NoteCategory, Priority, Task, TaskStatus, User, UserRole};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    /// `None` matches every status.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the title or description.
    #[serde(default)]
    pub search: Option<String>,
    /// Only tasks assigned to this user id.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Only high-priority tasks, applied before `priority`.
    #[serde(default)]
    pub high_priority_only: bool,
}

impl TaskFilter {
    pub fn is_active(&self) -> bool {
        self.status.is_some()
            || self.priority.is_some()
            || search_term(&self.search).is_some()
            || self.assigned_to.is_some()
            || self.high_priority_only
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.high_priority_only && task.priority != Priority::High {
            return false;
        }
        if let Some(user_id) = &self.assigned_to {
            if task.assigned_to.as_ref() != Some(user_id) {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        match search_term(&self.search) {
            Some(term) => contains_folded(&task.title, &term) || contains_folded(&task.description, &term),
            None => true,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum TaskSort {
    /// Keep the order the source returned.
    #[default]
    Default,
    /// By title, ignoring case and accents.
    Alphabetical,
    /// High, then medium, then low.
    Priority,
    /// In progress, then pending, then done.
    Status,
    /// Earliest first; tasks without a due date last.
    DueDate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NoteFilter {
    #[serde(default)]
    pub category: Option<NoteCategory>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the title or content.
    #[serde(default)]
    pub search: Option<String>,
}

impl NoteFilter {
    pub fn is_active(&self) -> bool {
        self.category.is_some() || self.priority.is_some() || search_term(&self.search).is_some()
    }

    pub fn matches(&self, note: &Note) -> bool {
        if self.category.is_some_and(|c| c != note.category) {
            return false;
        }
        if self.priority.is_some_and(|p| p != note.priority) {
            return false;
        }
        match search_term(&self.search) {
            Some(term) => contains_folded(&note.title, &term) || contains_folded(&note.content, &term),
            None => true,
        }
    }
}

/// Blank search strings count as "no search".
fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn contains_folded(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    tasks.iter().filter(|t| filter.matches(t)).cloned().collect()
}

pub fn filter_notes(notes: &[Note], filter: &NoteFilter) -> Vec<Note> {
    notes.iter().filter(|n| filter.matches(n)).cloned().collect()
}

pub fn filter_users(users: &[User], role: Option<UserRole>) -> Vec<User> {
    users
        .iter()
        .filter(|u| role.is_none_or(|r| r == u.role))
        .cloned()
        .collect()
}

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::High => 1,
        Priority::Medium => 2,
        Priority::Low => 3,
    }
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::InProgress => 1,
        TaskStatus::Pending => 2,
        TaskStatus::Done => 3,
    }
}

/// Lowercased title with combining accents removed, so "Ágil" sorts next
/// to "agil" rather than after "z".
fn title_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn compare_tasks(a: &Task, b: &Task, sort: TaskSort) -> Ordering {
    match sort {
        TaskSort::Default => Ordering::Equal,
        TaskSort::Alphabetical => title_key(&a.title).cmp(&title_key(&b.title)),
        TaskSort::Priority => priority_rank(a.priority).cmp(&priority_rank(b.priority)),
        TaskSort::Status => status_rank(a.status).cmp(&status_rank(b.status)),
        TaskSort::DueDate => match (a.due_date, b.due_date) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.cmp(&y),
        },
    }
}

pub fn sort_tasks(mut tasks: Vec<Task>, sort: TaskSort) -> Vec<Task> {
    if sort != TaskSort::Default {
        tasks.sort_by(|a, b| compare_tasks(a, b, sort));
    }
    tasks
}

/// Counts shown above a task list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub high_priority: usize,
}

pub fn task_stats(tasks: &[Task]) -> TaskStats {
    tasks.iter().fold(TaskStats::default(), |mut stats, task| {
        stats.total += 1;
        match task.status {
            TaskStatus::Pending => stats.pending += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Done => stats.done += 1,
        }
        if task.priority == Priority::High {
            stats.high_priority += 1;
        }
        stats
    })
}
