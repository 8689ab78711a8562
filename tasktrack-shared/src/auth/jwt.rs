/// Bearer token issuance and verification
///
/// Tokens are HS256 (HMAC-SHA256) JWTs naming the account they were issued
/// to. The issuer owns the signing secret, which is handed to it at
/// construction; nothing here reads process-wide state.
///
/// Verification deliberately stops at the signature: the expiry is decoded
/// and handed back so the session layer can tell an expired token apart from
/// a forged one.
///
/// # Example
///
/// ```
/// use tasktrack_shared::auth::jwt::TokenIssuer;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new("your-secret-key-at-least-32-bytes-long");
/// let account_id = Uuid::new_v4();
///
/// let token = issuer.issue(account_id)?;
/// let verified = issuer.verify(&token)?;
/// assert_eq!(verified.subject, account_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `iss` claim on every token
pub const ISSUER: &str = "tasktrack";

/// Default token lifetime
pub const DEFAULT_LIFETIME_HOURS: i64 = 72;

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, algorithm, issuer or encoding check failed
    #[error("Invalid token signature: {0}")]
    InvalidSignature(String),
}

/// Claims carried by a bearer token
///
/// - `sub`: account id
/// - `iss`: always [`ISSUER`]
/// - `iat` / `exp`: issue and expiry time (Unix seconds)
/// - `jti`: random id, so tokens minted in the same second differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    /// Builds claims for `subject` valid for `lifetime` from now
    pub fn new(subject: Uuid, lifetime: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: subject,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4(),
        }
    }
}

/// Result of a successful signature check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Account the token was issued to
    pub subject: Uuid,

    /// Issue time (Unix seconds)
    pub issued_at: i64,

    /// Expiry time (Unix seconds)
    pub expires_at: i64,
}

impl VerifiedToken {
    /// Whether the token has expired at `now` (Unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Mints and verifies signed bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer with the default 72 hour lifetime
    ///
    /// The secret should be at least 32 bytes, randomly generated and kept
    /// out of source control.
    pub fn new(secret: &str) -> Self {
        Self::with_lifetime(secret, Duration::hours(DEFAULT_LIFETIME_HOURS))
    }

    /// Creates an issuer with a custom token lifetime
    pub fn with_lifetime(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    /// Lifetime given to newly issued tokens
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a signed token for `subject`
    ///
    /// # Errors
    ///
    /// Returns `JwtError::CreateError` if encoding fails
    pub fn issue(&self, subject: Uuid) -> Result<String, JwtError> {
        self.issue_claims(&Claims::new(subject, self.lifetime))
    }

    /// Signs arbitrary claims with this issuer's key
    pub fn issue_claims(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies the signature and decodes subject and expiry
    ///
    /// Expiry is not enforced here; see [`VerifiedToken::is_expired_at`].
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidSignature` on tampering, a foreign key or
    /// algorithm, a wrong issuer, or anything that does not decode
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::InvalidSignature(e.to_string()))?;

        Ok(VerifiedToken {
            subject: data.claims.sub,
            issued_at: data.claims.iat,
            expires_at: data.claims.exp,
        })
    }
}
