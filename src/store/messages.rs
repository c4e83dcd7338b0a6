//! Message log persistence.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::{parse_json_list, parse_json_map};
use crate::model::{Message, MessageType};

#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    room: String,
    agent_id: Option<String>,
    agent_name: String,
    content: String,
    #[sqlx(rename = "type")]
    message_type: String,
    mentions: String,
    metadata: String,
    timestamp: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            room: row.room,
            agent_id: row.agent_id,
            agent_name: row.agent_name,
            content: row.content,
            message_type: row.message_type.parse().unwrap_or(MessageType::Message),
            mentions: parse_json_list(&row.mentions),
            metadata: parse_json_map(&row.metadata),
            timestamp: row.timestamp,
        }
    }
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one message row. The log is append-only; there is no update.
    pub async fn insert(&self, msg: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, room, agent_id, agent_name, content, type, mentions, metadata, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&msg.id)
        .bind(&msg.room)
        .bind(&msg.agent_id)
        .bind(&msg.agent_name)
        .bind(&msg.content)
        .bind(msg.message_type.to_string())
        .bind(serde_json::to_string(&msg.mentions).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&msg.metadata).unwrap_or_else(|_| "{}".into()))
        .bind(&msg.timestamp)
        .execute(&self.pool)
        .await
        .context("inserting message")?;

        Ok(())
    }

    /// Messages for a room, optionally after `since`, the most recent `limit`
    /// of them, returned in chronological order.
    pub async fn list_for_room(
        &self,
        room: &str,
        since: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Message>> {
        let mut sql = String::from(
            "SELECT id, room, agent_id, agent_name, content, type, mentions, metadata, timestamp \
             FROM messages WHERE room = ?",
        );
        if since.is_some() {
            sql.push_str(" AND timestamp > ?");
        }
        // rowid breaks ties between messages landing in the same millisecond,
        // keeping insertion order stable across hydrations.
        sql.push_str(" ORDER BY timestamp DESC, rowid DESC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, MessageRow>(&sql).bind(room);
        if let Some(since) = since {
            query = query.bind(since);
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        let mut rows = query
            .fetch_all(&self.pool)
            .await
            .context("listing messages")?;
        rows.reverse();

        Ok(rows.into_iter().map(Message::from).collect())
    }
}
