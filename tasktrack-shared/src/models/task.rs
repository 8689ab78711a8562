/// Task model and database operations
///
/// Tasks belong to exactly one account. Every query here filters on both the
/// task id and the owner id, so a task owned by someone else is
/// indistinguishable from a missing one.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     owner_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     title TEXT NOT NULL CHECK (length(btrim(title)) > 0),
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     metadata JSONB NOT NULL DEFAULT '{}',
///     created_at BIGINT NOT NULL,
///     updated_at BIGINT NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use std::collections::HashMap;
/// use tasktrack_shared::models::task::{Task, CreateTask};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, owner_id, CreateTask {
///     title: "Write report".to_string(),
///     completed: false,
///     metadata: HashMap::from([("priority".to_string(), "high".to_string())]),
/// }, chrono::Utc::now().timestamp()).await?;
///
/// let found = Task::find(&pool, owner_id, task.id).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::task_update::MergedUpdate;

const TASK_COLUMNS: &str = "id, owner_id, title, completed, metadata, created_at, updated_at";

/// Task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Account that owns the task
    pub owner_id: Uuid,

    /// Non-empty title
    pub title: String,

    pub completed: bool,

    /// Free-form string metadata
    pub metadata: HashMap<String, String>,

    /// Creation time (Unix seconds)
    pub created_at: i64,

    /// Last update time (Unix seconds)
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    completed: bool,
    metadata: Json<HashMap<String, String>>,
    created_at: i64,
    updated_at: i64,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            completed: row.completed,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a new task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Task {
    /// Builds the record that `create` would insert
    pub fn from_new(owner_id: Uuid, data: CreateTask, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: data.title,
            completed: data.completed,
            metadata: data.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a merged update in place
    ///
    /// Metadata changes are merged into the current map; a full `metadata`
    /// without changes replaces it.
    pub fn apply(&mut self, update: &MergedUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        match (&update.metadata_changes, &update.metadata) {
            (Some(changes), _) => self
                .metadata
                .extend(changes.iter().map(|(k, v)| (k.clone(), v.clone()))),
            (None, Some(metadata)) => self.metadata = metadata.clone(),
            (None, None) => {}
        }
        self.updated_at = update.updated_at;
    }

    /// Inserts a new task for `owner_id`
    pub async fn create(
        pool: &PgPool,
        owner_id: Uuid,
        data: CreateTask,
        now: i64,
    ) -> Result<Self, sqlx::Error> {
        let task = Self::from_new(owner_id, data, now);

        let query = format!(
            r#"
            INSERT INTO tasks (id, owner_id, title, completed, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(task.id)
            .bind(task.owner_id)
            .bind(&task.title)
            .bind(task.completed)
            .bind(Json(&task.metadata))
            .bind(now)
            .fetch_one(pool)
            .await?;

        Ok(row.into())
    }

    /// Finds a task by ID within an owner's tasks
    pub async fn find(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND owner_id = $2",
            TASK_COLUMNS
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Lists an owner's tasks, newest first
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks WHERE owner_id = $1 ORDER BY created_at DESC, id",
            TASK_COLUMNS
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Writes a merged update
    ///
    /// Only fields present in `update` are written; `updated_at` always is.
    ///
    /// # Returns
    ///
    /// The updated task, or None if the owner has no such task
    pub async fn update_fields(
        pool: &PgPool,
        owner_id: Uuid,
        id: Uuid,
        update: &MergedUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE tasks SET updated_at = $3");
        let mut bind_count = 3;

        if update.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if update.completed.is_some() {
            bind_count += 1;
            query.push_str(&format!(", completed = ${}", bind_count));
        }
        if update.metadata_changes.is_some() {
            // JSONB concatenation merges against the stored row, not a stale read
            bind_count += 1;
            query.push_str(&format!(", metadata = metadata || ${}", bind_count));
        } else if update.metadata.is_some() {
            bind_count += 1;
            query.push_str(&format!(", metadata = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND owner_id = $2 RETURNING {}",
            TASK_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(update.updated_at);

        if let Some(title) = &update.title {
            q = q.bind(title);
        }
        if let Some(completed) = update.completed {
            q = q.bind(completed);
        }
        if let Some(changes) = &update.metadata_changes {
            q = q.bind(Json(changes));
        } else if let Some(metadata) = &update.metadata {
            q = q.bind(Json(metadata));
        }

        let row = q.fetch_optional(pool).await?;

        Ok(row.map(Into::into))
    }

    /// Deletes a task
    ///
    /// # Returns
    ///
    /// True if the owner had such a task
    pub async fn delete(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
