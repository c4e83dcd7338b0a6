//! Notification persistence.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::model::Notification;

/// Pull reads are capped; older notifications age out of view.
const LIST_CAP: i64 = 50;

#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    agent_id: String,
    room: String,
    message: String,
    #[sqlx(rename = "type")]
    notification_type: String,
    is_read: bool,
    created_at: String,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            agent_id: row.agent_id,
            room: row.room,
            message: row.message,
            notification_type: row.notification_type,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, n: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, agent_id, room, message, type, is_read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&n.id)
        .bind(&n.agent_id)
        .bind(&n.room)
        .bind(&n.message)
        .bind(&n.notification_type)
        .bind(n.is_read)
        .bind(&n.created_at)
        .execute(&self.pool)
        .await
        .context("inserting notification")?;

        Ok(())
    }

    /// Notifications for an agent, newest first, capped.
    pub async fn list(&self, agent_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let mut sql = String::from(
            "SELECT id, agent_id, room, message, type, is_read, created_at \
             FROM notifications WHERE agent_id = ?",
        );
        if unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");

        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(agent_id)
            .bind(LIST_CAP)
            .fetch_all(&self.pool)
            .await
            .context("listing notifications")?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, agent_id, room, message, type, is_read, created_at \
             FROM notifications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching notification")?;

        Ok(row.map(Notification::from))
    }

    /// Mark a notification read. Idempotent; returns whether the row changed.
    pub async fn mark_read(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("marking notification read")?;

        Ok(result.rows_affected() > 0)
    }
}
