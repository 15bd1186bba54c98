use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::desk::UNASSIGNED;
use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::query::{NoteFilter, TaskFilter, TaskSort};
use crate::settings::Overrides;
use crate::types::{
    NewNote, NewTask, NewUser, NoteCategory, NotePatch, Priority, TaskPatch, TaskStatus, UserPatch,
    UserRole,
};

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// REST backend base URL
    #[arg(long, global = true, env = "TASKDESK_API_URL")]
    pub api_url: Option<String>,

    /// Serve from the fallback store only
    #[arg(long, global = true, env = "TASKDESK_OFFLINE")]
    pub offline: bool,

    /// Simulated latency of the fallback store
    #[arg(long, global = true, env = "TASKDESK_MOCK_DELAY_MS")]
    pub mock_delay_ms: Option<u64>,

    /// Persist the fallback store to this JSON file
    #[arg(long, global = true, env = "TASKDESK_STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true, env = "TASKDESK_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_url: self.api_url.clone(),
            offline: self.offline.then_some(true),
            mock_delay_ms: self.mock_delay_ms,
            store_file: self.store_file.clone(),
            ..Overrides::default()
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
    /// Manage notes
    #[command(subcommand)]
    Notes(NoteCommand),
    /// Manage users
    #[command(subcommand)]
    Users(UserCommand),
    /// Show or edit settings.json
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Start the MCP server
    Serve(ServeArgs),
    /// Print version information
    Version,
}

impl Command {
    /// Whether the command changes stored records.
    pub fn is_write(&self) -> bool {
        match self {
            Command::Tasks(cmd) => !matches!(
                cmd,
                TaskCommand::List(_)
                    | TaskCommand::Get { .. }
                    | TaskCommand::Board
                    | TaskCommand::Stats { .. }
            ),
            Command::Notes(cmd) => !matches!(cmd, NoteCommand::List(_) | NoteCommand::Get { .. }),
            Command::Users(cmd) => !matches!(cmd, UserCommand::List { .. } | UserCommand::Get { .. }),
            Command::Config(ConfigCommand::Edit) => true,
            _ => false,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// List tasks
    List(TaskListArgs),
    /// Show one task
    Get { id: String },
    /// Create a task
    Create(TaskCreateArgs),
    /// Change fields of a task
    Update(TaskUpdateArgs),
    /// Delete a task
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Assign a task to a user; "unassigned" clears it
    Assign { id: String, user: String },
    /// Set the status of a task
    Status { id: String, status: TaskStatus },
    /// Mark a task as done
    Complete { id: String },
    /// Show every task with its assignee
    Board,
    /// Count tasks by status and priority
    Stats {
        /// Only tasks assigned to this user id
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskListArgs {
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub priority: Option<Priority>,
    /// Case-insensitive text in the title or description
    #[arg(long)]
    pub search: Option<String>,
    /// Only tasks assigned to this user id
    #[arg(long)]
    pub user: Option<String>,
    /// Only high-priority tasks
    #[arg(long)]
    pub high: bool,
    #[arg(long, value_enum, default_value_t = TaskSort::Default)]
    pub sort: TaskSort,
}

impl TaskListArgs {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            search: self.search.clone(),
            assigned_to: self.user.clone(),
            high_priority_only: self.high,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TaskCreateArgs {
    pub title: String,
    #[arg(long, short, default_value = "")]
    pub description: String,
    #[arg(long, default_value_t = TaskStatus::Pending)]
    pub status: TaskStatus,
    #[arg(long, default_value_t = Priority::Medium)]
    pub priority: Priority,
    /// Due date, YYYY-MM-DD or RFC 3339
    #[arg(long, value_parser = parse_due)]
    pub due: Option<DateTime<Utc>>,
    /// Assignee user id
    #[arg(long)]
    pub assign: Option<String>,
}

impl TaskCreateArgs {
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due,
            image: None,
            assigned_to: self.assign,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TaskUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, short)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
    pub due: Option<DateTime<Utc>>,
    /// Remove the due date
    #[arg(long)]
    pub clear_due: bool,
    /// Remove the attached image
    #[arg(long)]
    pub clear_image: bool,
    /// Assignee user id; "unassigned" clears it
    #[arg(long)]
    pub assign: Option<String>,
}

impl TaskUpdateArgs {
    pub fn patch(&self) -> TaskPatch {
        TaskPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
            image: self.clear_image.then_some(None),
            assigned_to: self.assign.as_ref().map(|user| {
                (user != UNASSIGNED && !user.is_empty()).then(|| user.clone())
            }),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum NoteCommand {
    /// List notes
    List(NoteListArgs),
    /// Show one note
    Get { id: String },
    /// Create a note
    Create(NoteCreateArgs),
    /// Change fields of a note
    Update(NoteUpdateArgs),
    /// Delete a note
    Delete {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
    /// Move a note to another category
    Category { id: String, category: NoteCategory },
}

#[derive(Args, Debug, Clone, Default)]
pub struct NoteListArgs {
    #[arg(long)]
    pub category: Option<NoteCategory>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub search: Option<String>,
}

impl NoteListArgs {
    pub fn filter(&self) -> NoteFilter {
        NoteFilter {
            category: self.category,
            priority: self.priority,
            search: self.search.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct NoteCreateArgs {
    pub title: String,
    pub content: String,
    #[arg(long, default_value_t = NoteCategory::Todo)]
    pub category: NoteCategory,
    #[arg(long, default_value_t = Priority::Medium)]
    pub priority: Priority,
}

impl NoteCreateArgs {
    pub fn into_new_note(self) -> NewNote {
        NewNote {
            title: self.title,
            content: self.content,
            category: self.category,
            priority: self.priority,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct NoteUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub category: Option<NoteCategory>,
    #[arg(long)]
    pub priority: Option<Priority>,
}

impl NoteUpdateArgs {
    pub fn patch(&self) -> NotePatch {
        NotePatch {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category,
            priority: self.priority,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// List users
    List {
        #[arg(long)]
        role: Option<UserRole>,
    },
    /// Show one user
    Get { id: String },
    /// Create a user
    Create(UserCreateArgs),
    /// Change fields of a user
    Update(UserUpdateArgs),
    /// Delete a user
    Delete {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
    /// Change the role of a user
    Role { id: String, role: UserRole },
}

#[derive(Args, Debug, Clone)]
pub struct UserCreateArgs {
    pub name: String,
    pub email: String,
    #[arg(long, default_value_t = UserRole::User)]
    pub role: UserRole,
    #[arg(long, default_value = "")]
    pub department: String,
    #[arg(long, default_value = "")]
    pub position: String,
    /// Avatar image URL
    #[arg(long)]
    pub avatar: Option<String>,
}

impl UserCreateArgs {
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            name: self.name,
            email: self.email,
            role: self.role,
            avatar: self.avatar,
            department: self.department,
            position: self.position,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct UserUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub role: Option<UserRole>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub position: Option<String>,
    #[arg(long, conflicts_with = "clear_avatar")]
    pub avatar: Option<String>,
    #[arg(long)]
    pub clear_avatar: bool,
}

impl UserUpdateArgs {
    pub fn patch(&self) -> UserPatch {
        UserPatch {
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            avatar: if self.clear_avatar {
                Some(None)
            } else {
                self.avatar.clone().map(Some)
            },
            department: self.department.clone(),
            position: self.position.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the resolved settings
    Show,
    /// Edit settings.json interactively
    Edit,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Enable the stdio transport
    #[arg(long, env = "TASKDESK_ENABLE_STDIO", num_args = 0..=1, default_missing_value = "true")]
    pub enable_stdio: Option<bool>,

    /// Enable the streamable HTTP transport
    #[arg(long, env = "TASKDESK_ENABLE_HTTP", num_args = 0..=1, default_missing_value = "true")]
    pub enable_http: Option<bool>,

    /// Streamable HTTP bind address
    #[arg(long, env = "TASKDESK_HTTP_ADDR")]
    pub http_addr: Option<String>,
}

impl ServeArgs {
    pub fn apply_to(&self, overrides: &mut Overrides) {
        overrides.enable_stdio = self.enable_stdio;
        overrides.enable_http = self.enable_http;
        overrides.http_addr = self.http_addr.clone();
    }
}

/// Accepts a plain date (midnight UTC) or a full RFC 3339 timestamp.
fn parse_due(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| format!("invalid date '{value}'"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected YYYY-MM-DD or RFC 3339, got '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once(PKG_NAME).chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_flags_build_a_filter() {
        let cli = parse(&["tasks", "list", "--status", "in-progress", "--high", "--sort", "due-date"]);
        let Command::Tasks(TaskCommand::List(args)) = cli.command else {
            panic!("expected tasks list");
        };
        let filter = args.filter();
        assert_eq!(filter.status, Some(TaskStatus::InProgress));
        assert!(filter.high_priority_only);
        assert_eq!(args.sort, TaskSort::DueDate);
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = parse(&["notes", "list", "--offline", "--json", "--mock-delay-ms", "20"]);
        assert!(cli.global.json);
        let overrides = cli.global.overrides();
        assert_eq!(overrides.offline, Some(true));
        assert_eq!(overrides.mock_delay_ms, Some(20));
        assert_eq!(overrides.api_url, None);
    }

    #[test]
    fn update_flags_distinguish_clear_from_untouched() {
        let cli = parse(&["tasks", "update", "4", "--clear-due", "--assign", "unassigned"]);
        let Command::Tasks(TaskCommand::Update(args)) = cli.command else {
            panic!("expected tasks update");
        };
        let patch = args.patch();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.assigned_to, Some(None));
        assert_eq!(patch.image, None);
        assert_eq!(patch.title, None);
    }

    #[test]
    fn due_dates_accept_plain_dates_and_timestamps() {
        let day = parse_due("2025-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        let ts = parse_due("2025-03-01T10:30:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-01T08:30:00+00:00");
        assert!(parse_due("next week").is_err());
    }

    #[test]
    fn reads_are_not_writes() {
        assert!(!parse(&["tasks", "board"]).command.is_write());
        assert!(!parse(&["tasks", "stats", "--user", "2"]).command.is_write());
        assert!(!parse(&["users", "list", "--role", "admin"]).command.is_write());
        assert!(parse(&["tasks", "complete", "1"]).command.is_write());
        assert!(parse(&["notes", "delete", "2", "--yes"]).command.is_write());
    }

    #[test]
    fn serve_flags_become_overrides() {
        let cli = parse(&["serve", "--enable-http", "--http-addr", "127.0.0.1:9000"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let mut overrides = Overrides::default();
        args.apply_to(&mut overrides);
        assert_eq!(overrides.enable_http, Some(true));
        assert_eq!(overrides.enable_stdio, None);
        assert_eq!(overrides.http_addr.as_deref(), Some("127.0.0.1:9000"));
    }
}
