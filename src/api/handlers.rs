//! Request handlers for the hub API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::hub::{HubStats, NewTask, TaskPatch};
use crate::model::{parse_ts, Agent, JsonMap, MemoryEntry, Message, Notification, Room, Task};
use crate::sharedfs::FsEntry;

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Default and fallback history page size.
const DEFAULT_HISTORY_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default)]
    pub capabilities: JsonMap,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub success: bool,
    pub room: Room,
    pub agents: Vec<Agent>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub agent_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: JsonMap,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message_id: String,
    pub mentions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub since: Option<String>,
    /// Parsed leniently: non-numeric or negative falls back to the default.
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<crate::hub::RoomSummary>,
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<Agent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub room_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee: Option<String>,
    pub creator: String,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub content: String,
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub success: bool,
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMemoryRequest {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MemoryResponse {
    pub success: bool,
    pub memory: MemoryEntry,
}

#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemoriesResponse {
    pub memories: Vec<MemoryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    pub unread_only: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub updated: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileWriteResponse {
    pub success: bool,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FileEntriesResponse {
    pub entries: Vec<FsEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/join/{room}
pub async fn join_room(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<JoinResponse>> {
    let outcome = state
        .hub
        .join_room(&room, &req.agent_id, &req.agent_name, req.capabilities)
        .await?;

    Ok(Json(JoinResponse {
        success: true,
        room: outcome.room,
        agents: outcome.agents,
    }))
}

/// POST /api/leave/{agent_id}
pub async fn leave_room(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.hub.leave_room(&agent_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/send
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<SendResponse>> {
    let msg = state
        .hub
        .send_message(&req.agent_id, req.content, req.metadata)
        .await?;

    Ok(Json(SendResponse {
        success: true,
        message_id: msg.id,
        mentions: msg.mentions,
    }))
}

/// GET /api/messages/{room}
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    let since = match &query.since {
        Some(raw) => Some(parse_ts(raw).map_err(ApiError::validation)?),
        None => None,
    };
    let limit = parse_limit(query.limit.as_deref());

    let messages = state.hub.history(&room, since.as_deref(), limit).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// GET /api/rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: state.hub.list_rooms().await,
    })
}

/// GET /api/agents/{room}
pub async fn list_agents(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> ApiResult<Json<AgentsResponse>> {
    Ok(Json(AgentsResponse {
        agents: state.hub.list_agents(&room).await?,
    }))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task = state
        .hub
        .create_task(NewTask {
            room_name: req.room_name,
            title: req.title,
            description: req.description,
            assignee: req.assignee,
            creator: req.creator,
            priority: req.priority,
        })
        .await?;

    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}

/// GET /api/tasks/{room}
pub async fn list_tasks(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> ApiResult<Json<TasksResponse>> {
    Ok(Json(TasksResponse {
        tasks: state.hub.list_tasks(&room).await?,
    }))
}

/// POST /api/tasks/{id}/update
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task = state
        .hub
        .update_task(
            &id,
            TaskPatch {
                status: req.status,
                assignee: req.assignee,
                priority: req.priority,
            },
        )
        .await?;

    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}

/// POST /api/broadcast/{room}
pub async fn broadcast(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    let from = req.from.as_deref().unwrap_or("System");
    let msg = state.hub.broadcast(&room, from, &req.content).await?;

    Ok(Json(BroadcastResponse {
        success: true,
        message_id: msg.id,
    }))
}

/// POST /api/memory/{agent_id}
pub async fn store_memory(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<StoreMemoryRequest>,
) -> ApiResult<Json<MemoryResponse>> {
    let memory = state
        .hub
        .store_memory(&agent_id, req.key, req.value, req.memory_type, req.expires_in)
        .await?;

    Ok(Json(MemoryResponse {
        success: true,
        memory,
    }))
}

/// GET /api/memory/{agent_id}
pub async fn get_memory(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<MemoryQuery>,
) -> ApiResult<Json<MemoriesResponse>> {
    let memories = state
        .hub
        .get_memory(&agent_id, query.key.as_deref(), query.memory_type.as_deref())
        .await?;

    Ok(Json(MemoriesResponse { memories }))
}

/// GET /api/notifications/{agent_id}
pub async fn get_notifications(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Json<NotificationsResponse>> {
    let unread_only = matches!(query.unread_only.as_deref(), Some("true") | Some("1"));
    let notifications = state.hub.notifications(&agent_id, unread_only).await?;

    Ok(Json(NotificationsResponse { notifications }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MarkReadResponse>> {
    let updated = state.hub.mark_notification_read(&id).await?;
    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<HubStats>> {
    Ok(Json(state.hub.stats().await?))
}

/// GET /api/files?path=
pub async fn read_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let path = require_path(&query)?;
    let bytes = state.files.read(&path).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

/// PUT /api/files?path=
pub async fn write_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> ApiResult<Json<FileWriteResponse>> {
    let path = require_path(&query)?;
    state.files.write(&path, &body).await?;

    Ok(Json(FileWriteResponse {
        success: true,
        path,
    }))
}

/// DELETE /api/files?path=
pub async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Json<FileWriteResponse>> {
    let path = require_path(&query)?;
    state.files.delete(&path).await?;

    Ok(Json(FileWriteResponse {
        success: true,
        path,
    }))
}

/// GET /api/files/list?path=
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Json<FileEntriesResponse>> {
    let path = query.path.clone().unwrap_or_else(|| ".".to_string());
    Ok(Json(FileEntriesResponse {
        entries: state.files.list(&path).await?,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn require_path(query: &FileQuery) -> ApiResult<String> {
    query
        .path
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("invalid file request: path is required"))
}

/// Lenient limit parsing: `0` means empty, junk and negatives mean default.
fn parse_limit(raw: Option<&str>) -> usize {
    match raw {
        None => DEFAULT_HISTORY_LIMIT,
        Some(s) => match s.parse::<i64>() {
            Ok(n) if n >= 0 => n as usize,
            _ => DEFAULT_HISTORY_LIMIT,
        },
    }
}
