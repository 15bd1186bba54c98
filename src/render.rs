//! Terminal output for CLI results.

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::desk::Assignment;
use crate::error::ServiceResult;
use crate::query::TaskStats;
use crate::types::{Note, NoteCategory, Priority, Task, TaskStatus, User, UserRole};

/// Pretty JSON for `--json` output.
pub fn json<T: Serialize>(value: &T) -> ServiceResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn status_badge(status: TaskStatus) -> ColoredString {
    let label = format!("[{status}]");
    match status {
        TaskStatus::Pending => label.yellow(),
        TaskStatus::InProgress => label.blue(),
        TaskStatus::Done => label.green(),
    }
}

fn priority_badge(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => priority.as_str().red().bold(),
        Priority::Medium => priority.as_str().yellow(),
        Priority::Low => priority.as_str().dimmed(),
    }
}

fn category_badge(category: NoteCategory) -> ColoredString {
    let label = format!("#{category}");
    match category {
        NoteCategory::Todo => label.cyan(),
        NoteCategory::Idea => label.magenta(),
        NoteCategory::Reminder => label.yellow(),
        NoteCategory::Meeting => label.blue(),
        NoteCategory::Personal => label.green(),
    }
}

fn role_badge(role: UserRole) -> ColoredString {
    match role {
        UserRole::Admin => role.as_str().red(),
        UserRole::Manager => role.as_str().yellow(),
        UserRole::User => role.as_str().normal(),
    }
}

/// Days between `now` and `due`, phrased relative to today.
pub fn due_label(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (due.date_naive() - now.date_naive()).num_days();
    match days {
        0 => "due today".to_string(),
        1 => "due tomorrow".to_string(),
        -1 => "overdue by 1 day".to_string(),
        d if d < 0 => format!("overdue by {} days", -d),
        d => format!("due in {d} days"),
    }
}

fn task_line(task: &Task, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{} {} {} ({})",
        task.id.dimmed(),
        status_badge(task.status),
        task.title.bold(),
        priority_badge(task.priority)
    );
    if let Some(due) = task.due_date {
        let label = due_label(due, now);
        let label = if due < now && task.status != TaskStatus::Done {
            label.red()
        } else {
            label.normal()
        };
        line.push_str(&format!(" {label}"));
    }
    line
}

pub fn tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks".dimmed().to_string();
    }
    let now = Utc::now();
    tasks
        .iter()
        .map(|t| task_line(t, now))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn task(task: &Task) -> String {
    let mut out = task_line(task, Utc::now());
    if !task.description.is_empty() {
        out.push_str(&format!("\n  {}", task.description));
    }
    if let Some(user) = &task.assigned_to {
        out.push_str(&format!("\n  assigned to {user}"));
    }
    if task.image.is_some() {
        out.push_str(&format!("\n  {}", "has image".dimmed()));
    }
    out
}

pub fn assignments(board: &[Assignment]) -> String {
    if board.is_empty() {
        return "No tasks".dimmed().to_string();
    }
    let now = Utc::now();
    board
        .iter()
        .map(|entry| {
            let who = match (&entry.assignee, &entry.task.assigned_to) {
                (Some(user), _) => user.name.cyan().to_string(),
                (None, Some(stale)) => format!("unknown user {stale}").red().to_string(),
                (None, None) => "unassigned".dimmed().to_string(),
            };
            format!("{}  -> {who}", task_line(&entry.task, now))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn stats(stats: &TaskStats) -> String {
    format!(
        "{} total  {} pending  {} in progress  {} done  {} high priority",
        stats.total.to_string().bold(),
        stats.pending.to_string().yellow(),
        stats.in_progress.to_string().blue(),
        stats.done.to_string().green(),
        stats.high_priority.to_string().red()
    )
}

fn note_line(note: &Note) -> String {
    format!(
        "{} {} {} ({})",
        note.id.dimmed(),
        category_badge(note.category),
        note.title.bold(),
        priority_badge(note.priority)
    )
}

pub fn notes(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes".dimmed().to_string();
    }
    notes.iter().map(note_line).collect::<Vec<_>>().join("\n")
}

pub fn note(note: &Note) -> String {
    format!(
        "{}\n  {}\n  {}",
        note_line(note),
        note.content,
        format!("updated {}", note.updated_at.format("%Y-%m-%d %H:%M")).dimmed()
    )
}

fn user_line(user: &User) -> String {
    format!(
        "{} {} <{}> {}",
        user.id.dimmed(),
        user.name.bold(),
        user.email,
        role_badge(user.role)
    )
}

pub fn users(users: &[User]) -> String {
    if users.is_empty() {
        return "No users".dimmed().to_string();
    }
    users.iter().map(user_line).collect::<Vec<_>>().join("\n")
}

pub fn user(user: &User) -> String {
    let mut out = user_line(user);
    match (user.position.is_empty(), user.department.is_empty()) {
        (false, false) => out.push_str(&format!("\n  {}, {}", user.position, user.department)),
        (false, true) => out.push_str(&format!("\n  {}", user.position)),
        (true, false) => out.push_str(&format!("\n  {}", user.department)),
        (true, true) => {}
    }
    out
}
