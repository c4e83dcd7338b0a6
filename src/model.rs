//! Hub data models.
//!
//! Everything that crosses the wire is camelCase JSON; timestamps are
//! RFC 3339 UTC with millisecond precision, which sorts lexicographically
//! and so doubles as the store's ordering key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form JSON object (capabilities, settings, metadata).
pub type JsonMap = serde_json::Map<String, Value>;

/// Current timestamp in canonical textual form.
pub fn now_ts() -> String {
    canonical_ts(Utc::now())
}

/// Render an instant in the canonical textual form.
pub fn canonical_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a caller-supplied timestamp, normalizing to the canonical form.
pub fn parse_ts(raw: &str) -> Result<String, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| canonical_ts(dt.with_timezone(&Utc)))
        .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))
}

/// Agent presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Online,
    Busy,
    Away,
    Offline,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Online => write!(f, "online"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Away => write!(f, "away"),
            AgentStatus::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AgentStatus::Active),
            "online" => Ok(AgentStatus::Online),
            "busy" => Ok(AgentStatus::Busy),
            "away" => Ok(AgentStatus::Away),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(format!("invalid agent status: {}", s)),
        }
    }
}

/// Message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Message,
    System,
    Broadcast,
    FileChange,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Message => write!(f, "message"),
            MessageType::System => write!(f, "system"),
            MessageType::Broadcast => write!(f, "broadcast"),
            MessageType::FileChange => write!(f, "file_change"),
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(MessageType::Message),
            "system" => Ok(MessageType::System),
            "broadcast" => Ok(MessageType::Broadcast),
            "file_change" => Ok(MessageType::FileChange),
            _ => Err(format!("invalid message type: {}", s)),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(format!("invalid task priority: {}", s)),
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
    Blocked,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            _ => Err(format!("invalid task status: {}", s)),
        }
    }
}

/// A named channel scoping messages, tasks, and push fanout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    pub created_at: String,
    pub is_active: bool,
    pub settings: JsonMap,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: now_ts(),
            is_active: true,
            settings: JsonMap::new(),
        }
    }
}

/// An external participant, addressable by display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub room: Option<String>,
    pub capabilities: JsonMap,
    pub joined_at: String,
    pub last_active: String,
    pub status: AgentStatus,
    /// Derived view of the push-session registry; never persisted.
    #[serde(default)]
    pub connected: bool,
}

/// One entry in a room's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room: String,
    pub agent_id: Option<String>,
    pub agent_name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub mentions: Vec<String>,
    pub metadata: JsonMap,
    pub timestamp: String,
}

impl Message {
    /// An ordinary agent-authored message.
    pub fn from_agent(
        room: &str,
        agent_id: &str,
        agent_name: &str,
        content: String,
        mentions: Vec<String>,
        metadata: JsonMap,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.to_string(),
            agent_id: Some(agent_id.to_string()),
            agent_name: agent_name.to_string(),
            content,
            message_type: MessageType::Message,
            mentions,
            metadata,
            timestamp: now_ts(),
        }
    }

    /// A hub-authored system message ("X joined", "X left").
    pub fn system(room: &str, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.to_string(),
            agent_id: None,
            agent_name: "System".to_string(),
            content,
            message_type: MessageType::System,
            mentions: Vec::new(),
            metadata: JsonMap::new(),
            timestamp: now_ts(),
        }
    }

    /// An operator broadcast, labeled with its origin.
    pub fn broadcast(room: &str, from: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.to_string(),
            agent_id: None,
            agent_name: from.to_string(),
            content: format!("[{}] {}", from, content),
            message_type: MessageType::Broadcast,
            mentions: Vec::new(),
            metadata: JsonMap::new(),
            timestamp: now_ts(),
        }
    }

    /// A synthetic message describing a shared-workspace change.
    pub fn file_change(room: &str, rel_path: &str, action: &str) -> Self {
        let mut metadata = JsonMap::new();
        metadata.insert("filePath".to_string(), Value::String(rel_path.to_string()));
        metadata.insert("action".to_string(), Value::String(action.to_string()));
        let verb = match action {
            "add" => "created",
            "delete" => "deleted",
            _ => "changed",
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.to_string(),
            agent_id: None,
            agent_name: "System".to_string(),
            content: format!("File {}: {}", verb, rel_path),
            message_type: MessageType::FileChange,
            mentions: Vec::new(),
            metadata,
            timestamp: now_ts(),
        }
    }
}

/// A unit of coordinated work owned by a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub room: String,
    pub title: String,
    pub description: String,
    pub assignee: Option<String>,
    pub creator: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A per-agent key/value memory, optionally expiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    pub agent_id: String,
    pub room: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub created_at: String,
    pub expires_at: Option<String>,
}

/// A per-recipient record derived from a mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub agent_id: String,
    pub room: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub is_read: bool,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_timestamps_sort_chronologically() {
        let a = parse_ts("2026-01-02T03:04:05.100Z").unwrap();
        let b = parse_ts("2026-01-02T03:04:05.200Z").unwrap();
        let c = parse_ts("2026-01-02T03:04:06Z").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn parse_ts_normalizes_offsets() {
        let ts = parse_ts("2026-01-02T04:00:00.000+01:00").unwrap();
        assert_eq!(ts, "2026-01-02T03:00:00.000Z");
    }

    #[test]
    fn parse_ts_rejects_garbage() {
        assert!(parse_ts("yesterday").is_err());
    }

    #[test]
    fn task_status_round_trips() {
        for s in ["todo", "in_progress", "review", "done", "blocked"] {
            let parsed: TaskStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("urgent".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn broadcast_message_prefixes_origin() {
        let msg = Message::broadcast("lab", "Op", "X");
        assert_eq!(msg.content, "[Op] X");
        assert_eq!(msg.message_type, MessageType::Broadcast);
        assert!(msg.agent_id.is_none());
    }

    #[test]
    fn message_json_uses_wire_names() {
        let msg = Message::system("lab", "Alice joined".into());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "system");
        assert_eq!(json["agentName"], "System");
        assert!(json["agentId"].is_null());
    }
}
