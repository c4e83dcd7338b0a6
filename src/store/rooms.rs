//! Room persistence.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::parse_json_map;
use crate::model::Room;

#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    name: String,
    created_at: String,
    is_active: bool,
    settings: String,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            name: row.name,
            created_at: row.created_at,
            is_active: row.is_active,
            settings: parse_json_map(&row.settings),
        }
    }
}

impl RoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a room row.
    pub async fn upsert(&self, room: &Room) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rooms (name, created_at, is_active, settings)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                is_active = excluded.is_active,
                settings = excluded.settings
            "#,
        )
        .bind(&room.name)
        .bind(&room.created_at)
        .bind(room.is_active)
        .bind(serde_json::to_string(&room.settings).unwrap_or_else(|_| "{}".into()))
        .execute(&self.pool)
        .await
        .context("upserting room")?;

        Ok(())
    }

    /// List active rooms, oldest first.
    pub async fn list_active(&self) -> Result<Vec<Room>> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT name, created_at, is_active, settings
            FROM rooms
            WHERE is_active = 1
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("listing active rooms")?;

        Ok(rows.into_iter().map(Room::from).collect())
    }
}
