//! Task persistence.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::model::{Task, TaskPriority, TaskStatus};

#[derive(Debug, Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    room: String,
    title: String,
    description: String,
    assignee: Option<String>,
    creator: String,
    priority: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            room: row.room,
            title: row.title,
            description: row.description,
            assignee: row.assignee,
            creator: row.creator,
            priority: row.priority.parse().unwrap_or(TaskPriority::Medium),
            status: row.status.parse().unwrap_or(TaskStatus::Todo),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TASK_COLUMNS: &str =
    "id, room, title, description, assignee, creator, priority, status, created_at, updated_at";

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, room, title, description, assignee, creator, priority, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.room)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee)
        .bind(&task.creator)
        .bind(task.priority.to_string())
        .bind(task.status.to_string())
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .execute(&self.pool)
        .await
        .context("inserting task")?;

        Ok(())
    }

    /// Persist a merged task (tasks mutate in place).
    pub async fn update(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, assignee = ?, priority = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee)
        .bind(task.priority.to_string())
        .bind(task.status.to_string())
        .bind(&task.updated_at)
        .bind(&task.id)
        .execute(&self.pool)
        .await
        .context("updating task")?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching task")?;

        Ok(row.map(Task::from))
    }

    pub async fn list_for_room(&self, room: &str) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE room = ? ORDER BY created_at ASC"
        ))
        .bind(room)
        .fetch_all(&self.pool)
        .await
        .context("listing tasks")?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await
            .context("counting tasks")?;

        Ok(count)
    }
}
