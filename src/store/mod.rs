//! Durable persistence for hub entities.
//!
//! One repository per entity over a shared pool. Writes are crash-safe
//! individually; nothing here is transactional across entities. The service
//! layer applies the consistency rule: persist first, then mutate memory,
//! then publish.

mod agents;
mod memory;
mod messages;
mod notifications;
mod rooms;
mod tasks;

pub use agents::AgentRepository;
pub use memory::MemoryRepository;
pub use messages::MessageRepository;
pub use notifications::NotificationRepository;
pub use rooms::RoomRepository;
pub use tasks::TaskRepository;

use sqlx::SqlitePool;

/// Bundle of all entity repositories.
#[derive(Debug, Clone)]
pub struct Store {
    pub rooms: RoomRepository,
    pub agents: AgentRepository,
    pub messages: MessageRepository,
    pub tasks: TaskRepository,
    pub memory: MemoryRepository,
    pub notifications: NotificationRepository,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            agents: AgentRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            tasks: TaskRepository::new(pool.clone()),
            memory: MemoryRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool),
        }
    }
}

/// Parse a JSON object column, tolerating rows written by older builds.
pub(crate) fn parse_json_map(raw: &str) -> crate::model::JsonMap {
    match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            log::warn!("discarding malformed JSON object column: {}", e);
            crate::model::JsonMap::new()
        }
    }
}

/// Parse a JSON string-array column.
pub(crate) fn parse_json_list(raw: &str) -> Vec<String> {
    match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(e) => {
            log::warn!("discarding malformed JSON list column: {}", e);
            Vec::new()
        }
    }
}
