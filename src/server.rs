use std::net::SocketAddr;

use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{
    RoleServer, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::desk::{Desk, UNASSIGNED};
use crate::error::{ServiceError, ServiceResult};
use crate::query::{NoteFilter, TaskFilter, TaskSort};
use crate::settings::Settings;
use crate::types::{
    NewNote, NewTask, NewUser, NoteCategory, NotePatch, TaskPatch, TaskStatus, UserPatch, UserRole,
};

const TASKS_URI: &str = "taskdesk://tasks";
const NOTES_URI: &str = "taskdesk://notes";
const USERS_URI: &str = "taskdesk://users";

// Tool argument types

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListTasksArgs {
    #[serde(flatten)]
    pub filter: TaskFilter,
    #[serde(default)]
    pub sort: TaskSort,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct TaskStatsArgs {
    /// Only count tasks assigned to this user id.
    #[serde(rename = "assignedTo", default)]
    pub assigned_to: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateTaskArgs {
    pub id: String,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct AssignTaskArgs {
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// User id, or null / "unassigned" to clear the assignment.
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct TaskStatusArgs {
    pub id: String,
    pub status: TaskStatus,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListNotesArgs {
    #[serde(flatten)]
    pub filter: NoteFilter,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateNoteArgs {
    pub id: String,
    #[serde(flatten)]
    pub patch: NotePatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct NoteCategoryArgs {
    pub id: String,
    pub category: NoteCategory,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListUsersArgs {
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateUserArgs {
    pub id: String,
    #[serde(flatten)]
    pub patch: UserPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct UserRoleArgs {
    pub id: String,
    pub role: UserRole,
}

fn to_error_data(e: ServiceError) -> ErrorData {
    if e.is_caller_error() {
        ErrorData::invalid_params(e.to_string(), None)
    } else {
        ErrorData::internal_error(e.to_string(), None)
    }
}

#[derive(Clone)]
pub struct TaskDeskServer {
    desk: Desk,
    pub tool_router: ToolRouter<TaskDeskServer>,
}

impl TaskDeskServer {
    /// Run `op` against the desk on a blocking thread.
    async fn call<T, F>(&self, op: F) -> Result<T, ErrorData>
    where
        T: Send + 'static,
        F: FnOnce(&Desk) -> ServiceResult<T> + Send + 'static,
    {
        let desk = self.desk.clone();
        tokio::task::spawn_blocking(move || op(&desk))
            .await
            .map_err(|e| ErrorData::internal_error(format!("desk call panicked: {e}"), None))?
            .map_err(to_error_data)
    }

    async fn call_json<T, F>(&self, op: F) -> Result<CallToolResult, ErrorData>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&Desk) -> ServiceResult<T> + Send + 'static,
    {
        let value = self.call(op).await?;
        Ok(CallToolResult::success(vec![Content::json(value)?]))
    }
}

#[tool_router]
impl TaskDeskServer {
    pub fn new(desk: Desk) -> Self {
        Self {
            desk,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List tasks, optionally filtered by status, priority, search text or assignee, and sorted")]
    async fn list_tasks(
        &self,
        Parameters(args): Parameters<ListTasksArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.task_board(&args.filter, args.sort))
            .await
    }

    #[tool(description = "Count tasks by status plus high-priority tasks, optionally for one assignee")]
    async fn task_stats(
        &self,
        Parameters(args): Parameters<TaskStatsArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.task_stats(args.assigned_to.as_deref()))
            .await
    }

    #[tool(description = "Get a task by id")]
    async fn get_task(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.task(&args.id)).await
    }

    #[tool(description = "Create a task")]
    async fn create_task(
        &self,
        Parameters(task): Parameters<NewTask>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.create_task(task)).await
    }

    #[tool(description = "Update some fields of a task; null clears dueDate, image or assignedTo")]
    async fn update_task(
        &self,
        Parameters(args): Parameters<UpdateTaskArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.update_task(&args.id, args.patch))
            .await
    }

    #[tool(description = "Delete a task")]
    async fn delete_task(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = args.id.clone();
        self.call(move |desk| desk.delete_task(&args.id)).await?;
        Ok(CallToolResult::success(vec![Content::json(json!({ "deleted": id }))?]))
    }

    #[tool(description = "Mark a task as done")]
    async fn complete_task(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.complete_task(&args.id)).await
    }

    #[tool(description = "Assign a task to a user, or clear the assignment")]
    async fn assign_task(
        &self,
        Parameters(args): Parameters<AssignTaskArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.assign_task(&args.task_id, args.user_id.as_deref()))
            .await
    }

    #[tool(description = "Set the status of a task (pending, in-progress, done)")]
    async fn set_task_status(
        &self,
        Parameters(args): Parameters<TaskStatusArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.set_task_status(&args.id, args.status))
            .await
    }

    #[tool(description = "List every task with its assignee resolved")]
    async fn assignment_board(&self) -> Result<CallToolResult, ErrorData> {
        self.call_json(|desk| desk.assignment_board()).await
    }

    #[tool(description = "List notes, optionally filtered by category, priority or search text")]
    async fn list_notes(
        &self,
        Parameters(args): Parameters<ListNotesArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.note_board(&args.filter)).await
    }

    #[tool(description = "Get a note by id")]
    async fn get_note(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.note(&args.id)).await
    }

    #[tool(description = "Create a note")]
    async fn create_note(
        &self,
        Parameters(note): Parameters<NewNote>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.create_note(note)).await
    }

    #[tool(description = "Update some fields of a note")]
    async fn update_note(
        &self,
        Parameters(args): Parameters<UpdateNoteArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.update_note(&args.id, args.patch))
            .await
    }

    #[tool(description = "Delete a note")]
    async fn delete_note(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = args.id.clone();
        self.call(move |desk| desk.delete_note(&args.id)).await?;
        Ok(CallToolResult::success(vec![Content::json(json!({ "deleted": id }))?]))
    }

    #[tool(description = "Move a note to another category")]
    async fn set_note_category(
        &self,
        Parameters(args): Parameters<NoteCategoryArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.set_note_category(&args.id, args.category))
            .await
    }

    #[tool(description = "List users, optionally only those with a given role")]
    async fn list_users(
        &self,
        Parameters(args): Parameters<ListUsersArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.users(args.role)).await
    }

    #[tool(description = "Get a user by id")]
    async fn get_user(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.user(&args.id)).await
    }

    #[tool(description = "Create a user")]
    async fn create_user(
        &self,
        Parameters(user): Parameters<NewUser>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.create_user(user)).await
    }

    #[tool(description = "Update some fields of a user")]
    async fn update_user(
        &self,
        Parameters(args): Parameters<UpdateUserArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.update_user(&args.id, args.patch))
            .await
    }

    #[tool(description = "Delete a user; tasks assigned to them keep the stale id")]
    async fn delete_user(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = args.id.clone();
        self.call(move |desk| desk.delete_user(&args.id)).await?;
        Ok(CallToolResult::success(vec![Content::json(json!({ "deleted": id }))?]))
    }

    #[tool(description = "Change the role of a user (admin, manager, user)")]
    async fn set_user_role(
        &self,
        Parameters(args): Parameters<UserRoleArgs>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call_json(move |desk| desk.set_user_role(&args.id, args.role))
            .await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for TaskDeskServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "Task desk backed by '{}'. Use the tools to manage tasks, notes and users; \
                 pass \"{UNASSIGNED}\" as userId to clear a task assignment.",
                self.desk.source_name()
            )),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new(TASKS_URI, "Tasks").no_annotation(),
                RawResource::new(NOTES_URI, "Notes").no_annotation(),
                RawResource::new(USERS_URI, "Users").no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let body = match uri.as_str() {
            TASKS_URI => {
                let tasks = self
                    .call(|desk| desk.task_board(&TaskFilter::default(), TaskSort::Default))
                    .await?;
                serde_json::to_string_pretty(&tasks)
            }
            NOTES_URI => {
                let notes = self.call(|desk| desk.note_board(&NoteFilter::default())).await?;
                serde_json::to_string_pretty(&notes)
            }
            USERS_URI => {
                let users = self.call(|desk| desk.users(None)).await?;
                serde_json::to_string_pretty(&users)
            }
            _ => {
                return Err(ErrorData::resource_not_found(
                    "Unknown resource URI",
                    Some(json!({ "uri": uri })),
                ));
            }
        }
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(body, uri)],
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, ErrorData> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
        })
    }
}

/// Serve the desk over the transports enabled in `settings` until every
/// transport has stopped or Ctrl-C is pressed.
pub async fn serve(desk: Desk, settings: &Settings) -> ServiceResult<()> {
    settings.validate_for_serve()?;
    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    if settings.enable_http {
        let addr: SocketAddr = settings
            .http_addr
            .parse()
            .map_err(|e| ServiceError::Config(format!("Invalid http address: {e}")))?;
        let factory_desk = desk.clone();
        let http_service = TowerToHyperService::new(StreamableHttpService::new(
            move || Ok(TaskDeskServer::new(factory_desk.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        ));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Streamable HTTP transport listening");

        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = token.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept HTTP connection");
                            continue;
                        }
                    },
                };
                let io = TokioIo::new(stream);
                let service = http_service.clone();
                tokio::spawn(async move {
                    if let Err(e) = Builder::new(TokioExecutor::default())
                        .serve_connection(io, service)
                        .await
                    {
                        tracing::debug!(error = %e, "HTTP connection ended with error");
                    }
                });
            }
            tracing::info!("HTTP transport stopped");
        }));
    }

    if settings.enable_stdio {
        let running = TaskDeskServer::new(desk.clone())
            .serve_with_ct(stdio(), shutdown.child_token())
            .await
            .map_err(|e| ServiceError::Other(format!("stdio transport failed to start: {e}")))?;
        tracing::info!("Stdio transport ready");
        handles.push(tokio::spawn(async move {
            let _ = running.waiting().await;
            tracing::info!("Stdio transport stopped");
        }));
    }

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            ctrl_c.cancel();
        }
    });

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Transport task failed");
        }
    }
    Ok(())
}
