/// PostgreSQL store
///
/// Delegates to the model queries and bounds each call with
/// `tokio::time::timeout`, turning a stalled database into
/// [`StoreError::Timeout`] instead of a hung request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountStore, AvatarStore, Store, StoreError, StoreResult, TaskStore};
use crate::db::pool;
use crate::models::account::{Account, CreateAccount};
use crate::models::avatar::Avatar;
use crate::models::task::{CreateTask, Task};
use crate::models::task_update::MergedUpdate;

/// Default per-operation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "Store operation timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, data: CreateAccount, now: i64) -> StoreResult<Account> {
        self.run("create_account", Account::create(&self.pool, data, now))
            .await
            .map_err(|e| match e {
                StoreError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    StoreError::EmailTaken
                }
                other => other,
            })
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        self.run("find_account", Account::find_by_id(&self.pool, id)).await
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.run("find_account_by_email", Account::find_by_email(&self.pool, email))
            .await
    }

    async fn add_token(&self, id: Uuid, token: &str, now: i64) -> StoreResult<bool> {
        self.run("add_token", Account::add_token(&self.pool, id, token, now))
            .await
    }

    async fn remove_token(&self, id: Uuid, token: &str, now: i64) -> StoreResult<bool> {
        self.run("remove_token", Account::remove_token(&self.pool, id, token, now))
            .await
    }

    async fn clear_tokens(&self, id: Uuid, now: i64) -> StoreResult<bool> {
        self.run("clear_tokens", Account::clear_tokens(&self.pool, id, now))
            .await
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: i64,
    ) -> StoreResult<bool> {
        self.run(
            "update_password_hash",
            Account::update_password_hash(&self.pool, id, password_hash, now),
        )
        .await
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, owner_id: Uuid, data: CreateTask, now: i64) -> StoreResult<Task> {
        self.run("create_task", Task::create(&self.pool, owner_id, data, now))
            .await
    }

    async fn find_task(&self, owner_id: Uuid, id: Uuid) -> StoreResult<Option<Task>> {
        self.run("find_task", Task::find(&self.pool, owner_id, id)).await
    }

    async fn list_tasks(&self, owner_id: Uuid) -> StoreResult<Vec<Task>> {
        self.run("list_tasks", Task::list_by_owner(&self.pool, owner_id))
            .await
    }

    async fn update_task(
        &self,
        owner_id: Uuid,
        id: Uuid,
        update: &MergedUpdate,
    ) -> StoreResult<Option<Task>> {
        self.run(
            "update_task",
            Task::update_fields(&self.pool, owner_id, id, update),
        )
        .await
    }

    async fn delete_task(&self, owner_id: Uuid, id: Uuid) -> StoreResult<bool> {
        self.run("delete_task", Task::delete(&self.pool, owner_id, id))
            .await
    }
}

#[async_trait]
impl AvatarStore for PgStore {
    async fn put_avatar(&self, avatar: Avatar) -> StoreResult<()> {
        self.run("put_avatar", Avatar::replace(&self.pool, &avatar)).await
    }

    async fn find_avatar(&self, owner_id: Uuid) -> StoreResult<Option<Avatar>> {
        self.run("find_avatar", Avatar::find(&self.pool, owner_id)).await
    }

    async fn delete_avatar(&self, owner_id: Uuid) -> StoreResult<bool> {
        self.run("delete_avatar", Avatar::delete(&self.pool, owner_id))
            .await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.run("health_check", pool::health_check(&self.pool)).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
