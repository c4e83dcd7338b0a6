//! Agent persistence.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::parse_json_map;
use crate::model::{Agent, AgentStatus};

#[derive(Debug, Clone)]
pub struct AgentRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    name: String,
    room: Option<String>,
    capabilities: String,
    joined_at: String,
    last_active: String,
    status: String,
}

impl From<AgentRow> for Agent {
    fn from(row: AgentRow) -> Self {
        Agent {
            id: row.id,
            name: row.name,
            room: row.room,
            capabilities: parse_json_map(&row.capabilities),
            joined_at: row.joined_at,
            last_active: row.last_active,
            status: row.status.parse().unwrap_or(AgentStatus::Offline),
            connected: false,
        }
    }
}

impl AgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh an agent row.
    pub async fn upsert(&self, agent: &Agent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (id, name, room, capabilities, joined_at, last_active, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                room = excluded.room,
                capabilities = excluded.capabilities,
                last_active = excluded.last_active,
                status = excluded.status
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.room)
        .bind(serde_json::to_string(&agent.capabilities).unwrap_or_else(|_| "{}".into()))
        .bind(&agent.joined_at)
        .bind(&agent.last_active)
        .bind(agent.status.to_string())
        .execute(&self.pool)
        .await
        .context("upserting agent")?;

        Ok(())
    }

    /// Refresh an agent's activity timestamp.
    pub async fn touch(&self, id: &str, last_active: &str) -> Result<()> {
        sqlx::query("UPDATE agents SET last_active = ? WHERE id = ?")
            .bind(last_active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("touching agent")?;

        Ok(())
    }

    /// Record a departure: the row is kept, marked offline.
    pub async fn mark_offline(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE agents SET status = 'offline' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("marking agent offline")?;

        Ok(())
    }

    /// Agents still present in some room (used to restore rosters at boot).
    pub async fn list_present(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, name, room, capabilities, joined_at, last_active, status
            FROM agents
            WHERE room IS NOT NULL AND status != 'offline'
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("listing present agents")?;

        Ok(rows.into_iter().map(Agent::from).collect())
    }
}
