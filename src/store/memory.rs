//! Agent memory persistence.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::model::MemoryEntry;

#[derive(Debug, Clone)]
pub struct MemoryRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: String,
    agent_id: String,
    room: String,
    key: String,
    value: String,
    #[sqlx(rename = "type")]
    memory_type: String,
    created_at: String,
    expires_at: Option<String>,
}

impl From<MemoryRow> for MemoryEntry {
    fn from(row: MemoryRow) -> Self {
        MemoryEntry {
            id: row.id,
            agent_id: row.agent_id,
            room: row.room,
            key: row.key,
            value: row.value,
            memory_type: row.memory_type,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

impl MemoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &MemoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_memory (id, agent_id, room, key, value, type, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.agent_id)
        .bind(&entry.room)
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(&entry.memory_type)
        .bind(&entry.created_at)
        .bind(&entry.expires_at)
        .execute(&self.pool)
        .await
        .context("inserting memory entry")?;

        Ok(())
    }

    /// Active (unexpired) entries for an agent, newest first. Expiry is
    /// filtered lazily at query time.
    pub async fn list(
        &self,
        agent_id: &str,
        key: Option<&str>,
        memory_type: Option<&str>,
        now: &str,
    ) -> Result<Vec<MemoryEntry>> {
        let mut sql = String::from(
            "SELECT id, agent_id, room, key, value, type, created_at, expires_at \
             FROM agent_memory \
             WHERE agent_id = ? AND (expires_at IS NULL OR expires_at > ?)",
        );
        if key.is_some() {
            sql.push_str(" AND key = ?");
        }
        if memory_type.is_some() {
            sql.push_str(" AND type = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let mut query = sqlx::query_as::<_, MemoryRow>(&sql).bind(agent_id).bind(now);
        if let Some(key) = key {
            query = query.bind(key);
        }
        if let Some(memory_type) = memory_type {
            query = query.bind(memory_type);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("listing memory entries")?;

        Ok(rows.into_iter().map(MemoryEntry::from).collect())
    }
}
