//! Push-channel frame types.
//!
//! Frames are `{"event": "<name>", "data": {...}}` in both directions.
//! Outbound frames are [`crate::bus::HubEvent`] serialized directly; the
//! types here cover the inbound side.

use serde::Deserialize;

use crate::model::JsonMap;

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Bind this session to an agent and subscribe it to a room. Exactly one
    /// registration is expected per session.
    Register(RegisterFrame),
    /// Compatibility echo path: re-emit a message event to the stated room.
    Message(EchoFrame),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFrame {
    pub agent_id: String,
    pub room: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EchoFrame {
    /// Target room; the session's registered room when absent.
    pub room: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<JsonMap>,
}
