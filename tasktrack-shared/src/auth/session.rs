/// Bearer-token sessions
///
/// A session is a signed token that also appears in its account's
/// `active_tokens` list. The signature proves who the token was issued to;
/// list membership proves it has not been signed out. Either check failing
/// rejects the request, so a signed-out token stays dead until it would have
/// expired anyway.
///
/// `authenticate` runs its checks in a fixed order and stops at the first
/// failure:
///
/// 1. header present (`MissingHeader`)
/// 2. exactly `Bearer <token>` (`MalformedHeader`)
/// 3. signature (`InvalidSignature`)
/// 4. expiry (`Expired`)
/// 5. account exists (`AccountNotFound`)
/// 6. token is in the account's list (`TokenNotRegistered`)
///
/// The manager holds no mutable state of its own. Token list changes go to
/// the store as atomic add/remove operations.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasktrack_shared::auth::jwt::TokenIssuer;
/// use tasktrack_shared::auth::password::{CredentialVerifier, HashParams};
/// use tasktrack_shared::auth::session::{NewAccount, SessionManager};
/// use tasktrack_shared::store::memory::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sessions = SessionManager::new(
///     Arc::new(MemoryStore::new()),
///     TokenIssuer::new("example-secret-key-at-least-32-bytes"),
///     CredentialVerifier::new(HashParams { memory_kib: 1024, iterations: 1, parallelism: 1 }),
/// );
///
/// sessions.register(NewAccount {
///     email: "jane@example.com".to_string(),
///     first_name: "Jane".to_string(),
///     last_name: "Doe".to_string(),
///     mobile: None,
///     password: "correct horse".to_string(),
/// }).await?;
///
/// let token = sessions.sign_in("jane@example.com", "correct horse").await?;
/// let session = sessions.authenticate(Some(&format!("Bearer {}", token))).await?;
/// sessions.sign_out(&session.account, &session.token).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::jwt::{JwtError, TokenIssuer};
use super::password::{CredentialVerifier, PasswordError};
use crate::models::account::{Account, CreateAccount};
use crate::store::{AccountStore, StoreError};

/// Why a session operation was refused
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    #[error("Invalid token")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    /// Signed out, or never issued to this account
    #[error("Token is not active")]
    TokenNotRegistered,

    #[error("Account not found")]
    AccountNotFound,

    // The two credential failures share a message so callers cannot tell
    // which half was wrong.
    #[error("Incorrect email or password")]
    UnknownEmail,

    #[error("Incorrect email or password")]
    WrongPassword,

    #[error("Email address is already registered")]
    EmailTaken,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] JwtError),
}

impl SessionError {
    /// True for failures that mean "not authenticated" rather than a fault
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader
                | Self::MalformedHeader
                | Self::InvalidSignature
                | Self::Expired
                | Self::TokenNotRegistered
                | Self::AccountNotFound
                | Self::UnknownEmail
                | Self::WrongPassword
        )
    }
}

/// An authenticated request: the account plus the token it presented
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub account: Account,
    pub token: String,
}

/// Sign-up input; the password is hashed before it reaches the store
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile: Option<String>,
    pub password: String,
}

/// Issues, checks and revokes bearer-token sessions
pub struct SessionManager {
    accounts: Arc<dyn AccountStore>,
    issuer: TokenIssuer,
    verifier: CredentialVerifier,
    revoke_on_password_change: bool,
}

impl SessionManager {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        issuer: TokenIssuer,
        verifier: CredentialVerifier,
    ) -> Self {
        Self {
            accounts,
            issuer,
            verifier,
            revoke_on_password_change: false,
        }
    }

    /// Whether a password change also signs out every device (default: no)
    pub fn revoke_sessions_on_password_change(mut self, revoke: bool) -> Self {
        self.revoke_on_password_change = revoke;
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Creates an account with a freshly hashed password
    ///
    /// # Errors
    ///
    /// `EmailTaken` if the email is already registered (case-insensitive)
    pub async fn register(&self, new: NewAccount) -> Result<Account, SessionError> {
        let password = new.password;
        let password_hash = self
            .with_verifier(move |verifier| verifier.hash(&password))
            .await?;

        let data = CreateAccount {
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            mobile: new.mobile,
            password_hash,
        };

        let account = self
            .accounts
            .create_account(data, Utc::now().timestamp())
            .await
            .map_err(|e| match e {
                StoreError::EmailTaken => SessionError::EmailTaken,
                other => SessionError::Store(other),
            })?;

        info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Checks credentials and starts a new session
    ///
    /// The new token is added to the account's list alongside any existing
    /// ones; other devices stay signed in.
    ///
    /// # Errors
    ///
    /// `UnknownEmail` or `WrongPassword`, which display identically. An
    /// unknown email still pays for one hash verification.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<String, SessionError> {
        let password = password.to_string();

        let Some(account) = self.accounts.find_account_by_email(email).await? else {
            self.with_verifier(move |verifier| {
                verifier.verify_dummy(&password);
                Ok(())
            })
            .await?;
            debug!("Sign-in rejected: unknown email");
            return Err(SessionError::UnknownEmail);
        };

        let hash = account.password_hash.clone();
        let matches = self
            .with_verifier(move |verifier| verifier.verify(&password, &hash))
            .await?;
        if !matches {
            debug!(account_id = %account.id, "Sign-in rejected: wrong password");
            return Err(SessionError::WrongPassword);
        }

        let token = self.issuer.issue(account.id)?;
        if !self
            .accounts
            .add_token(account.id, &token, Utc::now().timestamp())
            .await?
        {
            // Deleted between lookup and update
            return Err(SessionError::AccountNotFound);
        }

        info!(account_id = %account.id, "Signed in");
        Ok(token)
    }

    /// Resolves an `Authorization` header value to an account
    pub async fn authenticate(&self, header: Option<&str>) -> Result<SessionContext, SessionError> {
        let token = bearer_token(header)?;

        let verified = self.issuer.verify(token).map_err(|e| {
            debug!(error = %e, "Token rejected");
            SessionError::InvalidSignature
        })?;

        if verified.is_expired_at(Utc::now().timestamp()) {
            return Err(SessionError::Expired);
        }

        let account = self
            .accounts
            .find_account(verified.subject)
            .await?
            .ok_or(SessionError::AccountNotFound)?;

        if !account.has_token(token) {
            debug!(account_id = %account.id, "Token is not in the active list");
            return Err(SessionError::TokenNotRegistered);
        }

        Ok(SessionContext {
            account,
            token: token.to_string(),
        })
    }

    /// Ends the session for exactly this token
    ///
    /// Not idempotent: signing out a token that is no longer active fails
    /// with `TokenNotRegistered`.
    pub async fn sign_out(&self, account: &Account, token: &str) -> Result<(), SessionError> {
        let removed = self
            .accounts
            .remove_token(account.id, token, Utc::now().timestamp())
            .await?;

        if !removed {
            return Err(SessionError::TokenNotRegistered);
        }

        info!(account_id = %account.id, "Signed out");
        Ok(())
    }

    /// Ends every session on the account
    pub async fn sign_out_all(&self, account: &Account) -> Result<(), SessionError> {
        if !self
            .accounts
            .clear_tokens(account.id, Utc::now().timestamp())
            .await?
        {
            return Err(SessionError::AccountNotFound);
        }

        info!(account_id = %account.id, "Signed out of all devices");
        Ok(())
    }

    /// Replaces the password after checking the current one
    ///
    /// Existing sessions survive unless the manager was built with
    /// [`revoke_sessions_on_password_change`](Self::revoke_sessions_on_password_change).
    ///
    /// # Errors
    ///
    /// `WrongPassword` if `old_password` does not match
    pub async fn change_password(
        &self,
        account: &Account,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        let old_password = old_password.to_string();
        let new_password = new_password.to_string();
        let hash = account.password_hash.clone();

        let new_hash = self
            .with_verifier(move |verifier| {
                if verifier.verify(&old_password, &hash)? {
                    verifier.hash(&new_password).map(Some)
                } else {
                    Ok(None)
                }
            })
            .await?
            .ok_or(SessionError::WrongPassword)?;

        let now = Utc::now().timestamp();
        if !self
            .accounts
            .update_password_hash(account.id, &new_hash, now)
            .await?
        {
            return Err(SessionError::AccountNotFound);
        }

        if self.revoke_on_password_change {
            self.accounts.clear_tokens(account.id, now).await?;
            info!(account_id = %account.id, "Password changed, all sessions revoked");
        } else {
            info!(account_id = %account.id, "Password changed");
        }

        Ok(())
    }

    /// Runs Argon2 work on the blocking pool
    async fn with_verifier<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&CredentialVerifier) -> Result<T, PasswordError> + Send + 'static,
        T: Send + 'static,
    {
        let verifier = self.verifier.clone();

        tokio::task::spawn_blocking(move || f(&verifier))
            .await
            .map_err(|e| PasswordError::HashError(format!("Hashing task failed: {}", e)))?
            .map_err(SessionError::from)
    }
}

/// Pulls the token out of `Bearer <token>`
///
/// The scheme is matched case-insensitively. Anything other than exactly two
/// space-separated parts is malformed.
fn bearer_token(header: Option<&str>) -> Result<&str, SessionError> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return Err(SessionError::MissingHeader),
    };

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(SessionError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashParams;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;
    use uuid::Uuid;

    const SECRET: &str = "session-test-secret-at-least-32-bytes";
    const EMAIL: &str = "jane@example.com";
    const PASSWORD: &str = "correct-horse";

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    fn manager_with(store: Arc<MemoryStore>, issuer: TokenIssuer) -> SessionManager {
        SessionManager::new(store, issuer, verifier())
    }

    async fn setup() -> (Arc<MemoryStore>, SessionManager, Account) {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager_with(store.clone(), TokenIssuer::new(SECRET));
        let account = sessions
            .register(NewAccount {
                email: EMAIL.to_string(),
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                mobile: None,
                password: PASSWORD.to_string(),
            })
            .await
            .expect("register");
        (store, sessions, account)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn test_sign_in_then_authenticate() {
        let (_, sessions, account) = setup().await;

        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();
        let session = sessions.authenticate(Some(&bearer(&token))).await.unwrap();

        assert_eq!(session.account.id, account.id);
        assert_eq!(session.token, token);
    }

    #[tokio::test]
    async fn test_sign_in_email_is_case_insensitive() {
        let (_, sessions, _) = setup().await;
        assert!(sessions.sign_in("  JANE@Example.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (_, sessions, _) = setup().await;

        let result = sessions
            .register(NewAccount {
                email: "Jane@Example.com".to_string(),
                first_name: "Other".to_string(),
                last_name: "Person".to_string(),
                mobile: None,
                password: "another-password".to_string(),
            })
            .await;
        assert!(matches!(result, Err(SessionError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_register_stores_hash_not_password() {
        let (store, _, account) = setup().await;

        let stored = store.find_account(account.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, PASSWORD);
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let (_, sessions, _) = setup().await;
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();
        let session = sessions.authenticate(Some(&bearer(&token))).await.unwrap();

        sessions.sign_out(&session.account, &token).await.unwrap();

        // Signature is still good, membership is not
        assert!(sessions.issuer().verify(&token).is_ok());
        assert!(matches!(
            sessions.authenticate(Some(&bearer(&token))).await,
            Err(SessionError::TokenNotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_twice_is_rejected() {
        let (_, sessions, account) = setup().await;
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();

        sessions.sign_out(&account, &token).await.unwrap();
        assert!(matches!(
            sessions.sign_out(&account, &token).await,
            Err(SessionError::TokenNotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_leaves_other_devices() {
        let (_, sessions, account) = setup().await;
        let phone = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();
        let laptop = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();

        sessions.sign_out(&account, &phone).await.unwrap();

        assert!(sessions.authenticate(Some(&bearer(&laptop))).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_all_revokes_every_token() {
        let (_, sessions, account) = setup().await;
        let tokens = vec![
            sessions.sign_in(EMAIL, PASSWORD).await.unwrap(),
            sessions.sign_in(EMAIL, PASSWORD).await.unwrap(),
            sessions.sign_in(EMAIL, PASSWORD).await.unwrap(),
        ];

        sessions.sign_out_all(&account).await.unwrap();

        for token in &tokens {
            assert!(matches!(
                sessions.authenticate(Some(&bearer(token))).await,
                Err(SessionError::TokenNotRegistered)
            ));
        }

        // Succeeds again with nothing left to clear
        sessions.sign_out_all(&account).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sign_ins_keep_every_token() {
        let (store, sessions, account) = setup().await;
        let sessions = Arc::new(sessions);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.sign_in(EMAIL, PASSWORD).await })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }

        let stored = store.find_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.active_tokens.len(), tokens.len());
        for token in &tokens {
            assert!(stored.has_token(token));
            assert!(sessions.authenticate(Some(&bearer(token))).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let (_, sessions, _) = setup().await;

        let unknown = sessions.sign_in("nobody@example.com", PASSWORD).await.unwrap_err();
        let wrong = sessions.sign_in(EMAIL, "wrong-password").await.unwrap_err();

        assert!(matches!(unknown, SessionError::UnknownEmail));
        assert!(matches!(wrong, SessionError::WrongPassword));
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(unknown.is_auth_failure() && wrong.is_auth_failure());
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (_, sessions, _) = setup().await;

        for header in [None, Some(""), Some("   ")] {
            assert!(matches!(
                sessions.authenticate(header).await,
                Err(SessionError::MissingHeader)
            ));
        }
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let (_, sessions, _) = setup().await;
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();

        for header in [
            token.clone(),
            "Bearer".to_string(),
            "Bearer ".to_string(),
            format!("Basic {}", token),
            format!("Bearer {} extra", token),
            format!("Bearer  {}", token),
        ] {
            assert!(
                matches!(
                    sessions.authenticate(Some(&header)).await,
                    Err(SessionError::MalformedHeader)
                ),
                "header '{}' should be malformed",
                header
            );
        }
    }

    #[tokio::test]
    async fn test_scheme_is_case_insensitive() {
        let (_, sessions, _) = setup().await;
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();

        assert!(sessions.authenticate(Some(&format!("bearer {}", token))).await.is_ok());
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let (_, sessions, account) = setup().await;

        let forged = TokenIssuer::new("some-other-secret-at-least-32-bytes")
            .issue(account.id)
            .unwrap();
        assert!(matches!(
            sessions.authenticate(Some(&bearer(&forged))).await,
            Err(SessionError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected_before_membership() {
        let store = Arc::new(MemoryStore::new());
        let expired_issuer = TokenIssuer::with_lifetime(SECRET, Duration::seconds(-60));
        let sessions = manager_with(store.clone(), expired_issuer);
        sessions
            .register(NewAccount {
                email: EMAIL.to_string(),
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                mobile: None,
                password: PASSWORD.to_string(),
            })
            .await
            .unwrap();

        // The token is registered, so only the expiry check can fail
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();
        assert!(matches!(
            sessions.authenticate(Some(&bearer(&token))).await,
            Err(SessionError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_unknown_subject() {
        let (_, sessions, _) = setup().await;

        let token = sessions.issuer().issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            sessions.authenticate(Some(&bearer(&token))).await,
            Err(SessionError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_valid_but_unregistered_token() {
        let (_, sessions, account) = setup().await;

        let token = sessions.issuer().issue(account.id).unwrap();
        assert!(matches!(
            sessions.authenticate(Some(&bearer(&token))).await,
            Err(SessionError::TokenNotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_change_password_keeps_sessions() {
        let (_, sessions, account) = setup().await;
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();

        sessions
            .change_password(&account, PASSWORD, "brand-new-password")
            .await
            .unwrap();

        assert!(sessions.authenticate(Some(&bearer(&token))).await.is_ok());
        assert!(matches!(
            sessions.sign_in(EMAIL, PASSWORD).await,
            Err(SessionError::WrongPassword)
        ));
        assert!(sessions.sign_in(EMAIL, "brand-new-password").await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_password() {
        let (_, sessions, account) = setup().await;

        let result = sessions
            .change_password(&account, "not-my-password", "brand-new-password")
            .await;
        assert!(matches!(result, Err(SessionError::WrongPassword)));
        assert!(sessions.sign_in(EMAIL, PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_can_revoke_sessions() {
        let (store, _, account) = setup().await;
        let sessions = manager_with(store, TokenIssuer::new(SECRET))
            .revoke_sessions_on_password_change(true);
        let token = sessions.sign_in(EMAIL, PASSWORD).await.unwrap();

        sessions
            .change_password(&account, PASSWORD, "brand-new-password")
            .await
            .unwrap();

        assert!(matches!(
            sessions.authenticate(Some(&bearer(&token))).await,
            Err(SessionError::TokenNotRegistered)
        ));
    }
}
