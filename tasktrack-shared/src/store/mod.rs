/// Persistence seam
///
/// The session manager and HTTP handlers talk to storage only through the
/// traits here. Two backends implement them:
///
/// - [`postgres::PgStore`]: production, every call bounded by a timeout
/// - [`memory::MemoryStore`]: process-local maps, used by tests and the
///   `memory` backend
///
/// Token-list operations are set operations (add-if-absent, remove-if-present,
/// clear). Backends must apply each one atomically against the current list so
/// that concurrent sign-ins and sign-outs on one account never lose updates.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasktrack_shared::store::{memory::MemoryStore, AccountStore};
/// use tasktrack_shared::models::account::CreateAccount;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tasktrack_shared::store::StoreError> {
/// let store = Arc::new(MemoryStore::new());
/// let account = store.create_account(CreateAccount {
///     email: "a@example.com".to_string(),
///     first_name: "A".to_string(),
///     last_name: "B".to_string(),
///     mobile: None,
///     password_hash: "hash".to_string(),
/// }, 0).await?;
///
/// assert!(store.add_token(account.id, "t1", 1).await?);
/// assert!(!store.add_token(account.id, "t1", 2).await?);
/// # Ok(())
/// # }
/// ```

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::account::{Account, CreateAccount};
use crate::models::avatar::Avatar;
use crate::models::task::{CreateTask, Task};
use crate::models::task_update::MergedUpdate;

pub mod memory;
pub mod postgres;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database reported an error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend did not answer in time
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Another account already uses this email
    #[error("Email address is already registered")]
    EmailTaken,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account records and their token lists
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account
    ///
    /// Fails with [`StoreError::EmailTaken`] if the normalized email exists.
    async fn create_account(&self, data: CreateAccount, now: i64) -> StoreResult<Account>;

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Case-insensitive email lookup
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Adds `token` unless present. True if it was added.
    async fn add_token(&self, id: Uuid, token: &str, now: i64) -> StoreResult<bool>;

    /// Removes `token` if present. True if it was removed.
    async fn remove_token(&self, id: Uuid, token: &str, now: i64) -> StoreResult<bool>;

    /// Empties the token list. True if the account exists.
    async fn clear_tokens(&self, id: Uuid, now: i64) -> StoreResult<bool>;

    /// True if the account exists
    async fn update_password_hash(&self, id: Uuid, password_hash: &str, now: i64)
        -> StoreResult<bool>;
}

/// Owner-scoped task records
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, owner_id: Uuid, data: CreateTask, now: i64) -> StoreResult<Task>;

    async fn find_task(&self, owner_id: Uuid, id: Uuid) -> StoreResult<Option<Task>>;

    /// Newest first
    async fn list_tasks(&self, owner_id: Uuid) -> StoreResult<Vec<Task>>;

    /// None if the owner has no such task
    async fn update_task(
        &self,
        owner_id: Uuid,
        id: Uuid,
        update: &MergedUpdate,
    ) -> StoreResult<Option<Task>>;

    async fn delete_task(&self, owner_id: Uuid, id: Uuid) -> StoreResult<bool>;
}

/// Avatar images, one per account
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Stores the image, replacing any previous one
    async fn put_avatar(&self, avatar: Avatar) -> StoreResult<()>;

    async fn find_avatar(&self, owner_id: Uuid) -> StoreResult<Option<Avatar>>;

    async fn delete_avatar(&self, owner_id: Uuid) -> StoreResult<bool>;
}

/// Everything the server needs from storage
#[async_trait]
pub trait Store: AccountStore + TaskStore + AvatarStore {
    /// Checks the backend is reachable
    async fn health_check(&self) -> StoreResult<()>;

    /// Short backend name for logs and the health endpoint
    fn backend_name(&self) -> &'static str;
}
