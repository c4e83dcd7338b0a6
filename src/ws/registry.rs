//! Push-session registry.
//!
//! Sessions are tracked in their own table keyed by session id; the agent
//! record never holds a socket handle, only a derived connected flag. A
//! reconnect therefore cannot revive state from a dead session.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// What a registered session is bound to.
#[derive(Debug, Clone)]
pub struct PushBinding {
    pub agent_id: String,
    pub room: String,
}

/// All live push sessions.
#[derive(Debug, Default)]
pub struct PushRegistry {
    sessions: DashMap<u64, PushBinding>,
    next_id: AtomicU64,
}

impl PushRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a freshly accepted connection. The session only
    /// appears in the table once it registers.
    pub fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Bind a session to an (agent, room) pair. Re-registration replaces
    /// the previous binding.
    pub fn bind(&self, session_id: u64, agent_id: &str, room: &str) {
        self.sessions.insert(
            session_id,
            PushBinding {
                agent_id: agent_id.to_string(),
                room: room.to_string(),
            },
        );
    }

    pub fn get(&self, session_id: u64) -> Option<PushBinding> {
        self.sessions.get(&session_id).map(|b| b.clone())
    }

    /// Drop a session's binding, returning it if one existed.
    pub fn release(&self, session_id: u64) -> Option<PushBinding> {
        self.sessions.remove(&session_id).map(|(_, b)| b)
    }

    /// Whether any live session is bound to the agent.
    pub fn is_agent_connected(&self, agent_id: &str) -> bool {
        self.sessions.iter().any(|e| e.value().agent_id == agent_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
