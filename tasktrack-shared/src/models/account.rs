/// Account model and database operations
///
/// An account owns a password hash, its tasks, an optional avatar and the list
/// of bearer tokens currently signed in on its behalf (one per device).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY,
///     email TEXT NOT NULL,
///     first_name TEXT NOT NULL,
///     last_name TEXT NOT NULL,
///     mobile TEXT,
///     password_hash TEXT NOT NULL,
///     active_tokens TEXT[] NOT NULL DEFAULT '{}',
///     created_at BIGINT NOT NULL,
///     updated_at BIGINT NOT NULL
/// );
/// CREATE UNIQUE INDEX accounts_email_lower_idx ON accounts (LOWER(email));
/// ```
///
/// # Token list
///
/// `active_tokens` is only ever changed by single-statement set operations
/// (`add_token`, `remove_token`, `clear_tokens`), never by writing back a
/// list read earlier, so concurrent sign-ins on one account cannot drop each
/// other's tokens.
///
/// # Example
///
/// ```no_run
/// use tasktrack_shared::models::account::{Account, CreateAccount};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let account = Account::create(&pool, CreateAccount {
///     email: "user@example.com".to_string(),
///     first_name: "Jane".to_string(),
///     last_name: "Doe".to_string(),
///     mobile: None,
///     password_hash: "$argon2id$...".to_string(),
/// }, chrono::Utc::now().timestamp()).await?;
///
/// let found = Account::find_by_email(&pool, "USER@example.com").await?;
/// assert_eq!(found.map(|a| a.id), Some(account.id));
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, email, first_name, last_name, mobile, password_hash, \
                               active_tokens, created_at, updated_at";

/// Account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID (UUID v4)
    pub id: Uuid,

    /// Email address, stored normalized (trimmed, lowercase)
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub mobile: Option<String>,

    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Tokens currently signed in, in issuance order
    #[serde(skip_serializing)]
    pub active_tokens: Vec<String>,

    /// Creation time (Unix seconds)
    pub created_at: i64,

    /// Last mutation time (Unix seconds)
    pub updated_at: i64,
}

impl Account {
    /// Whether `token` is currently signed in on this account
    pub fn has_token(&self, token: &str) -> bool {
        self.active_tokens.iter().any(|t| t == token)
    }
}

/// Input for creating a new account
#[derive(Debug, Clone)]
pub struct CreateAccount {
    /// Email address (normalized before insert)
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub mobile: Option<String>,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Account {
    /// Builds the record that `create` would insert
    pub fn from_new(data: CreateAccount, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&data.email),
            first_name: data.first_name,
            last_name: data.last_name,
            mobile: data.mobile,
            password_hash: data.password_hash,
            active_tokens: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts a new account
    ///
    /// # Errors
    ///
    /// Fails on a duplicate email (unique index `accounts_email_lower_idx`)
    /// or a database error
    pub async fn create(pool: &PgPool, data: CreateAccount, now: i64) -> Result<Self, sqlx::Error> {
        let account = Self::from_new(data, now);

        let query = format!(
            r#"
            INSERT INTO accounts (id, email, first_name, last_name, mobile, password_hash,
                                  active_tokens, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, '{{}}', $7, $7)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(account.id)
            .bind(&account.email)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(&account.mobile)
            .bind(&account.password_hash)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Finds an account by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an account by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM accounts WHERE LOWER(email) = $1",
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Appends `token` to the account's token list unless already present
    ///
    /// # Returns
    ///
    /// True if the token was added, false if the account is missing or
    /// already carries the token
    pub async fn add_token(
        pool: &PgPool,
        id: Uuid,
        token: &str,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET active_tokens = array_append(active_tokens, $2), updated_at = $3
            WHERE id = $1 AND NOT ($2 = ANY(active_tokens))
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes `token` from the account's token list
    ///
    /// # Returns
    ///
    /// True if the token was present and removed; false otherwise. Of two
    /// concurrent removals of the same token exactly one returns true.
    pub async fn remove_token(
        pool: &PgPool,
        id: Uuid,
        token: &str,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET active_tokens = array_remove(active_tokens, $2), updated_at = $3
            WHERE id = $1 AND $2 = ANY(active_tokens)
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Empties the account's token list
    ///
    /// # Returns
    ///
    /// True if the account exists
    pub async fn clear_tokens(pool: &PgPool, id: Uuid, now: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET active_tokens = '{}', updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the stored password hash
    ///
    /// # Returns
    ///
    /// True if the account exists
    pub async fn update_password_hash(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
