//! Hub orchestration: the write path every API and push operation goes
//! through.
//!
//! Side-effect order is fixed: persist, then mutate memory, then publish.
//! The room lock is held across all three on message paths so that log
//! order, commit order, and publish order coincide per room.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, EventScope, HubEvent, TaskChange, TaskEvent};
use crate::mention::extract_mentions;
use crate::model::{
    canonical_ts, now_ts, Agent, AgentStatus, JsonMap, MemoryEntry, Message, Notification, Room,
    Task, TaskPriority, TaskStatus,
};
use crate::notifier::Notifier;
use crate::store::Store;
use crate::ws::PushRegistry;

use super::state::{HubState, RoomState};

/// Room plus roster, returned from a join.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub room: Room,
    pub agents: Vec<Agent>,
}

/// One row of the rooms listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: String,
    pub agent_count: usize,
    pub agents: Vec<String>,
    pub created_at: String,
}

/// Per-room block of the stats report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub name: String,
    pub agent_count: usize,
    pub message_count: usize,
    pub is_active: bool,
}

/// Whole-hub stats report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub total_rooms: usize,
    pub total_agents: usize,
    pub total_tasks: i64,
    pub shared_directory: String,
    pub rooms: Vec<RoomStats>,
}

/// Fields of a new task, as accepted from the API.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub room_name: String,
    pub title: String,
    pub description: String,
    pub assignee: Option<String>,
    pub creator: String,
    pub priority: Option<String>,
}

/// Partial task update; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<String>,
}

/// The hub service.
pub struct Hub {
    store: Store,
    state: HubState,
    bus: EventBus,
    notifier: Notifier,
    registry: Arc<PushRegistry>,
    shared_dir: PathBuf,
}

impl Hub {
    pub fn new(store: Store, bus: EventBus, registry: Arc<PushRegistry>, shared_dir: PathBuf) -> Self {
        let notifier = Notifier::new(store.notifications.clone(), bus.clone());
        Self {
            store,
            state: HubState::new(),
            bus,
            notifier,
            registry,
            shared_dir,
        }
    }

    /// Load active rooms, their logs, and surviving rosters from the store.
    pub async fn hydrate(&self) -> Result<()> {
        let rooms = self.store.rooms.list_active().await?;
        let room_count = rooms.len();

        for meta in rooms {
            let name = meta.name.clone();
            let messages = self.store.messages.list_for_room(&name, None, None).await?;
            let (room, _) = self.state.room_or_insert(meta).await;
            room.inner.lock().await.messages = messages;
        }

        let mut restored = 0usize;
        for agent in self.store.agents.list_present().await? {
            let Some(room_name) = agent.room.clone() else {
                continue;
            };
            let Some(room) = self.state.room(&room_name).await else {
                continue;
            };
            room.inner.lock().await.members.insert(agent.id.clone());
            self.state.upsert_agent(agent).await;
            restored += 1;
        }

        info!(rooms = room_count, agents = restored, "hydrated hub state");
        Ok(())
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<PushRegistry> {
        &self.registry
    }

    // ======================================================================
    // Rooms and membership
    // ======================================================================

    pub async fn join_room(
        &self,
        room_name: &str,
        agent_id: &str,
        agent_name: &str,
        capabilities: JsonMap,
    ) -> Result<JoinOutcome> {
        if room_name.trim().is_empty() {
            bail!("invalid join: room name must not be empty");
        }
        if agent_id.is_empty() || agent_name.is_empty() {
            bail!("invalid join: agentId and agentName are required");
        }

        let room = self.room_or_create(room_name).await?;

        let now = now_ts();
        let prior = self.state.agent(agent_id).await;

        // Moving rooms removes the agent from its previous roster silently.
        if let Some(prev) = &prior {
            if let Some(old_name) = &prev.room {
                if old_name != room_name {
                    if let Some(old_room) = self.state.room(old_name).await {
                        old_room.inner.lock().await.members.remove(agent_id);
                    }
                }
            }
        }

        let agent = Agent {
            id: agent_id.to_string(),
            name: agent_name.to_string(),
            room: Some(room_name.to_string()),
            capabilities,
            joined_at: prior
                .as_ref()
                .map(|p| p.joined_at.clone())
                .unwrap_or_else(|| now.clone()),
            last_active: now,
            status: AgentStatus::Active,
            connected: self.registry.is_agent_connected(agent_id),
        };

        self.store.agents.upsert(&agent).await?;
        self.state.upsert_agent(agent).await;

        {
            let mut inner = room.inner.lock().await;
            if !inner.members.contains(agent_id) {
                let msg = Message::system(room_name, format!("{} joined", agent_name));
                self.store.messages.insert(&msg).await?;
                inner.messages.push(msg.clone());
                inner.members.insert(agent_id.to_string());
                self.bus
                    .publish(EventScope::Room(room_name.to_string()), HubEvent::Message(msg));
                info!(agent = agent_id, room = room_name, "agent joined");
            } else {
                debug!(agent = agent_id, room = room_name, "repeat join, no-op");
            }
        }

        let members = room.inner.lock().await.members.clone();
        let agents = self.state.agents_by_ids(&members).await;

        Ok(JoinOutcome {
            room: room.meta.clone(),
            agents,
        })
    }

    pub async fn leave_room(&self, agent_id: &str) -> Result<Agent> {
        let agent = self
            .state
            .agent(agent_id)
            .await
            .ok_or_else(|| anyhow!("agent not found: {}", agent_id))?;

        // The row survives departures, marked offline; only the in-memory
        // record goes away.
        self.store.agents.mark_offline(agent_id).await?;

        if let Some(room_name) = &agent.room {
            if let Some(room) = self.state.room(room_name).await {
                let mut inner = room.inner.lock().await;
                if inner.members.remove(agent_id) {
                    let msg = Message::system(room_name, format!("{} left", agent.name));
                    self.store.messages.insert(&msg).await?;
                    inner.messages.push(msg.clone());
                    self.bus
                        .publish(EventScope::Room(room_name.clone()), HubEvent::Message(msg));
                }
            }
        }

        self.state.remove_agent(agent_id).await;
        info!(agent = agent_id, "agent left");
        Ok(agent)
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut summaries = Vec::new();
        for room in self.state.rooms_snapshot().await {
            let members = room.inner.lock().await.members.clone();
            let agents = self.state.agents_by_ids(&members).await;
            summaries.push(RoomSummary {
                name: room.meta.name.clone(),
                agent_count: members.len(),
                agents: agents.into_iter().map(|a| a.name).collect(),
                created_at: room.meta.created_at.clone(),
            });
        }
        summaries
    }

    pub async fn list_agents(&self, room_name: &str) -> Result<Vec<Agent>> {
        let room = self.room(room_name).await?;
        let members = room.inner.lock().await.members.clone();
        Ok(self.state.agents_by_ids(&members).await)
    }

    // ======================================================================
    // Messages
    // ======================================================================

    pub async fn send_message(
        &self,
        agent_id: &str,
        content: String,
        metadata: JsonMap,
    ) -> Result<Message> {
        let agent = self
            .state
            .agent(agent_id)
            .await
            .ok_or_else(|| anyhow!("agent not found: {}", agent_id))?;
        let room_name = agent
            .room
            .clone()
            .ok_or_else(|| anyhow!("invalid send: agent {} has not joined a room", agent_id))?;
        let room = self.room(&room_name).await?;

        let mentions = extract_mentions(&content);
        let msg = Message::from_agent(&room_name, agent_id, &agent.name, content, mentions, metadata);

        {
            let mut inner = room.inner.lock().await;
            self.store.messages.insert(&msg).await?;
            inner.messages.push(msg.clone());
            self.bus
                .publish(EventScope::Room(room_name.clone()), HubEvent::Message(msg.clone()));
            self.notifier.fan_out(&msg, &self.state).await;
        }

        // Activity refresh is best-effort; the message already stands.
        let now = now_ts();
        if let Err(e) = self.store.agents.touch(agent_id, &now).await {
            warn!(agent = agent_id, "failed to persist lastActive: {:#}", e);
        }
        self.state.touch_agent(agent_id, &now).await;

        info!(
            agent = agent_id,
            room = %room_name,
            mentions = msg.mentions.len(),
            "message sent"
        );
        Ok(msg)
    }

    pub async fn broadcast(&self, room_name: &str, from: &str, content: &str) -> Result<Message> {
        if content.is_empty() {
            bail!("invalid broadcast: content is required");
        }
        let room = self.room(room_name).await?;
        let msg = Message::broadcast(room_name, from, content);

        {
            let mut inner = room.inner.lock().await;
            self.store.messages.insert(&msg).await?;
            inner.messages.push(msg.clone());
            self.bus
                .publish(EventScope::Room(room_name.to_string()), HubEvent::Message(msg.clone()));
        }

        info!(room = room_name, from = from, "broadcast sent");
        Ok(msg)
    }

    /// Most recent messages, chronological. `since` must already be in
    /// canonical form (see [`crate::model::parse_ts`]).
    pub async fn history(
        &self,
        room_name: &str,
        since: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let room = self.room(room_name).await?;
        let inner = room.inner.lock().await;

        let filtered: Vec<&Message> = match since {
            Some(since) => inner
                .messages
                .iter()
                .filter(|m| m.timestamp.as_str() > since)
                .collect(),
            None => inner.messages.iter().collect(),
        };

        let skip = filtered.len().saturating_sub(limit);
        Ok(filtered[skip..].iter().map(|m| (*m).clone()).collect())
    }

    /// Watcher entry point: one synthetic message per active room, appended
    /// in memory and published, never persisted.
    pub async fn file_changed(&self, rel_path: &str, action: &str) {
        for room in self.state.rooms_snapshot().await {
            if !room.meta.is_active {
                continue;
            }
            let msg = Message::file_change(&room.meta.name, rel_path, action);
            let mut inner = room.inner.lock().await;
            inner.messages.push(msg.clone());
            self.bus
                .publish(EventScope::Room(room.meta.name.clone()), HubEvent::Message(msg));
        }
        debug!(path = rel_path, action = action, "file change fanned out");
    }

    // ======================================================================
    // Tasks
    // ======================================================================

    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        if new.title.is_empty() || new.creator.is_empty() {
            bail!("invalid task: title and creator are required");
        }
        let room = self.room(&new.room_name).await?;
        let priority = match new.priority.as_deref() {
            Some(raw) => raw.parse::<TaskPriority>().map_err(|e| anyhow!(e))?,
            None => TaskPriority::Medium,
        };

        let now = now_ts();
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            room: new.room_name.clone(),
            title: new.title,
            description: new.description,
            assignee: new.assignee,
            creator: new.creator,
            priority,
            status: TaskStatus::Todo,
            created_at: now.clone(),
            updated_at: now,
        };

        {
            let _inner = room.inner.lock().await;
            self.store.tasks.insert(&task).await?;
            self.bus.publish(
                EventScope::Room(task.room.clone()),
                HubEvent::Task(TaskEvent {
                    change: TaskChange::Created,
                    task: task.clone(),
                }),
            );
        }

        info!(task = %task.id, room = %task.room, "task created");
        Ok(task)
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let mut task = self
            .store
            .tasks
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("task not found: {}", id))?;

        if let Some(raw) = patch.status.as_deref() {
            task.status = raw.parse::<TaskStatus>().map_err(|e| anyhow!(e))?;
        }
        if let Some(raw) = patch.priority.as_deref() {
            task.priority = raw.parse::<TaskPriority>().map_err(|e| anyhow!(e))?;
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = Some(assignee);
        }
        // Strictly after both creation and the previous update, even when the
        // clock has not advanced a full millisecond.
        let floor = task.created_at.clone().max(task.updated_at.clone());
        task.updated_at = monotonic_ts(&floor);

        self.store.tasks.update(&task).await?;

        let event = HubEvent::Task(TaskEvent {
            change: TaskChange::Updated,
            task: task.clone(),
        });
        match self.state.room(&task.room).await {
            Some(room) => {
                let _inner = room.inner.lock().await;
                self.bus.publish(EventScope::Room(task.room.clone()), event);
            }
            None => self.bus.publish(EventScope::Room(task.room.clone()), event),
        }

        info!(task = id, status = %task.status, "task updated");
        Ok(task)
    }

    pub async fn list_tasks(&self, room_name: &str) -> Result<Vec<Task>> {
        self.room(room_name).await?;
        self.store.tasks.list_for_room(room_name).await
    }

    // ======================================================================
    // Memory
    // ======================================================================

    pub async fn store_memory(
        &self,
        agent_id: &str,
        key: String,
        value: String,
        memory_type: Option<String>,
        expires_in: Option<i64>,
    ) -> Result<MemoryEntry> {
        if key.is_empty() {
            bail!("invalid memory entry: key is required");
        }

        let room = self
            .state
            .agent(agent_id)
            .await
            .and_then(|a| a.room)
            .unwrap_or_default();
        let now = Utc::now();

        let entry = MemoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            room,
            key,
            value,
            memory_type: memory_type.unwrap_or_else(|| "note".to_string()),
            created_at: canonical_ts(now),
            expires_at: expires_in.map(|secs| canonical_ts(now + Duration::seconds(secs))),
        };

        self.store.memory.insert(&entry).await?;
        debug!(agent = agent_id, key = %entry.key, "memory stored");
        Ok(entry)
    }

    pub async fn get_memory(
        &self,
        agent_id: &str,
        key: Option<&str>,
        memory_type: Option<&str>,
    ) -> Result<Vec<MemoryEntry>> {
        self.store
            .memory
            .list(agent_id, key, memory_type, &now_ts())
            .await
    }

    // ======================================================================
    // Notifications
    // ======================================================================

    pub async fn notifications(&self, agent_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.store.notifications.list(agent_id, unread_only).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<bool> {
        self.store
            .notifications
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("notification not found: {}", id))?;
        self.store.notifications.mark_read(id).await
    }

    // ======================================================================
    // Stats
    // ======================================================================

    pub async fn stats(&self) -> Result<HubStats> {
        let mut rooms = Vec::new();
        for room in self.state.rooms_snapshot().await {
            let inner = room.inner.lock().await;
            rooms.push(RoomStats {
                name: room.meta.name.clone(),
                agent_count: inner.members.len(),
                message_count: inner.messages.len(),
                is_active: room.meta.is_active,
            });
        }

        Ok(HubStats {
            total_rooms: rooms.len(),
            total_agents: self.state.agent_count().await,
            total_tasks: self.store.tasks.count().await?,
            shared_directory: self.shared_dir.display().to_string(),
            rooms,
        })
    }

    // ======================================================================
    // Push glue
    // ======================================================================

    /// Bind a push session and flip the agent's derived connected view.
    pub async fn bind_push(&self, session_id: u64, agent_id: &str, room: &str) {
        self.registry.bind(session_id, agent_id, room);
        self.state.set_connected(agent_id, true).await;
        info!(session = session_id, agent = agent_id, room = room, "push session registered");
    }

    /// Clear a session binding on disconnect. The agent stays in its room.
    pub async fn release_push(&self, session_id: u64) {
        if let Some(binding) = self.registry.release(session_id) {
            if !self.registry.is_agent_connected(&binding.agent_id) {
                self.state.set_connected(&binding.agent_id, false).await;
            }
            info!(session = session_id, agent = %binding.agent_id, "push session released");
        }
    }

    /// Compatibility echo path: a client-supplied frame is re-emitted to the
    /// stated room as an ephemeral message event, bypassing log and store.
    pub async fn echo_message(&self, agent_id: &str, room: &str, content: String, metadata: JsonMap) {
        let name = self
            .state
            .agent(agent_id)
            .await
            .map(|a| a.name)
            .unwrap_or_else(|| agent_id.to_string());
        let mentions = extract_mentions(&content);
        let msg = Message::from_agent(room, agent_id, &name, content, mentions, metadata);
        self.bus
            .publish(EventScope::Room(room.to_string()), HubEvent::Message(msg));
    }

    // ======================================================================
    // Internals
    // ======================================================================

    async fn room(&self, name: &str) -> Result<Arc<RoomState>> {
        self.state
            .room(name)
            .await
            .ok_or_else(|| anyhow!("room not found: {}", name))
    }

    async fn room_or_create(&self, name: &str) -> Result<Arc<RoomState>> {
        if let Some(room) = self.state.room(name).await {
            return Ok(room);
        }
        let meta = Room::new(name);
        self.store.rooms.upsert(&meta).await?;
        let (room, created) = self.state.room_or_insert(meta).await;
        if created {
            info!(room = name, "room created");
        }
        Ok(room)
    }
}

/// A timestamp strictly after `floor`, preferring the current clock.
fn monotonic_ts(floor: &str) -> String {
    let now = now_ts();
    if now.as_str() > floor {
        return now;
    }
    match DateTime::parse_from_rfc3339(floor) {
        Ok(dt) => canonical_ts(dt.with_timezone(&Utc) + Duration::milliseconds(1)),
        Err(_) => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_ts_advances_past_floor() {
        let floor = "2999-01-01T00:00:00.000Z";
        let next = monotonic_ts(floor);
        assert!(next.as_str() > floor);
        assert_eq!(next, "2999-01-01T00:00:00.001Z");
    }

    #[test]
    fn monotonic_ts_prefers_wall_clock_when_ahead() {
        let next = monotonic_ts("2001-01-01T00:00:00.000Z");
        assert!(next.starts_with("20"));
        assert!(next.as_str() > "2001-01-01T00:00:00.000Z");
    }
}
