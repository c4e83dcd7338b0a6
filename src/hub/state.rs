//! In-memory authoritative model.
//!
//! One lock per room guards its log and member set; the global room and
//! agent registries each take their own lock. Membership truth lives in the
//! room's member set; the agent's `room` field is a cached back-reference
//! maintained on join/leave.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::model::{Agent, Message, Room};

/// Mutable interior of a room.
#[derive(Debug, Default)]
pub struct RoomInner {
    /// Append-only message log, chronological.
    pub messages: Vec<Message>,
    /// Ids of agents currently present.
    pub members: HashSet<String>,
}

/// One room: immutable meta plus locked interior.
#[derive(Debug)]
pub struct RoomState {
    pub meta: Room,
    pub inner: Mutex<RoomInner>,
}

impl RoomState {
    pub fn new(meta: Room) -> Arc<Self> {
        Arc::new(Self {
            meta,
            inner: Mutex::new(RoomInner::default()),
        })
    }
}

/// Global registries: rooms by name, agents by id.
#[derive(Debug, Default)]
pub struct HubState {
    rooms: RwLock<HashMap<String, Arc<RoomState>>>,
    agents: RwLock<HashMap<String, Agent>>,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn room(&self, name: &str) -> Option<Arc<RoomState>> {
        self.rooms.read().await.get(name).cloned()
    }

    /// Get the named room, creating it if absent. Returns the room and
    /// whether it was created by this call.
    pub async fn room_or_insert(&self, room: Room) -> (Arc<RoomState>, bool) {
        let mut rooms = self.rooms.write().await;
        if let Some(existing) = rooms.get(&room.name) {
            return (existing.clone(), false);
        }
        let state = RoomState::new(room);
        rooms.insert(state.meta.name.clone(), state.clone());
        (state, true)
    }

    pub async fn rooms_snapshot(&self) -> Vec<Arc<RoomState>> {
        let mut rooms: Vec<_> = self.rooms.read().await.values().cloned().collect();
        rooms.sort_by(|a, b| a.meta.created_at.cmp(&b.meta.created_at));
        rooms
    }

    pub async fn agent(&self, id: &str) -> Option<Agent> {
        self.agents.read().await.get(id).cloned()
    }

    /// Name lookup for mention resolution. Linear scan; the expected agent
    /// population is small. Case-sensitive.
    pub async fn agent_by_name(&self, name: &str) -> Option<Agent> {
        self.agents
            .read()
            .await
            .values()
            .find(|a| a.name == name)
            .cloned()
    }

    pub async fn upsert_agent(&self, agent: Agent) {
        self.agents.write().await.insert(agent.id.clone(), agent);
    }

    pub async fn remove_agent(&self, id: &str) -> Option<Agent> {
        self.agents.write().await.remove(id)
    }

    pub async fn agents_by_ids(&self, ids: &HashSet<String>) -> Vec<Agent> {
        let agents = self.agents.read().await;
        let mut found: Vec<Agent> = ids.iter().filter_map(|id| agents.get(id).cloned()).collect();
        found.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        found
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Maintain the derived connected flag on an agent record.
    pub async fn set_connected(&self, id: &str, connected: bool) {
        if let Some(agent) = self.agents.write().await.get_mut(id) {
            agent.connected = connected;
        }
    }

    pub async fn touch_agent(&self, id: &str, last_active: &str) {
        if let Some(agent) = self.agents.write().await.get_mut(id) {
            agent.last_active = last_active.to_string();
        }
    }
}
