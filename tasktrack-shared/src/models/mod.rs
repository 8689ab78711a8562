/// Persisted records and their queries
///
/// # Models
///
/// - `account`: accounts, password hashes and active bearer tokens
/// - `task`: owner-scoped tasks with string metadata
/// - `task_update`: filtering and merging of partial task updates
/// - `avatar`: one profile image per account
///
/// # Example
///
/// ```no_run
/// use tasktrack_shared::models::account::{Account, CreateAccount};
/// use tasktrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let account = Account::create(&pool, CreateAccount {
///     email: "user@example.com".to_string(),
///     first_name: "John".to_string(),
///     last_name: "Doe".to_string(),
///     mobile: None,
///     password_hash: "$argon2id$...".to_string(),
/// }, chrono::Utc::now().timestamp()).await?;
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod avatar;
pub mod task;
pub mod task_update;
