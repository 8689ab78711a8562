/// Password hashing module using Argon2id
///
/// This module provides the credential verifier used at sign-up, sign-in and
/// password change. Hashes are PHC strings, so the parameters and salt travel
/// with the hash and verification never needs the original configuration.
///
/// # Security
///
/// - **Algorithm**: Argon2id (hybrid of Argon2i and Argon2d)
/// - **Memory**: 64 MB (65536 KB) by default
/// - **Iterations**: 3 passes by default
/// - **Parallelism**: 4 lanes by default
/// - **Output**: 32-byte hash
///
/// # Example
///
/// ```
/// use tasktrack_shared::auth::password::{CredentialVerifier, HashParams};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = CredentialVerifier::new(HashParams::default());
///
/// let hash = verifier.hash("super_secret_password_123")?;
/// assert!(verifier.verify("super_secret_password_123", &hash)?);
/// assert!(!verifier.verify("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use std::sync::OnceLock;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Hashes and checks account passwords
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    params: HashParams,

    /// Hashed with `params` on first use so unknown-account sign-ins pay
    /// this verifier's cost
    dummy_hash: OnceLock<Option<String>>,
}

impl CredentialVerifier {
    /// Creates a verifier hashing with the given parameters
    pub fn new(params: HashParams) -> Self {
        Self {
            params,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Hashes a password using Argon2id
    ///
    /// # Returns
    ///
    /// PHC string format hash (includes algorithm, parameters, salt, and hash)
    ///
    /// ```text
    /// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::HashError` if the parameters are rejected or
    /// hashing fails
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let params = ParamsBuilder::new()
            .m_cost(self.params.memory_kib)
            .t_cost(self.params.iterations)
            .p_cost(self.params.parallelism)
            .output_len(32)
            .build()
            .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verifies a password against a PHC hash
    ///
    /// Comparison is constant-time.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if password matches, `Ok(false)` if it doesn't
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::InvalidHash` when the stored hash cannot be
    /// parsed or lacks its salt or output
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

        if parsed_hash.salt.is_none() || parsed_hash.hash.is_none() {
            return Err(PasswordError::InvalidHash(
                "Hash is missing its salt or output".to_string(),
            ));
        }

        // Parameters are embedded in the hash
        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
        }
    }

    /// Burns one verification against a throwaway hash
    ///
    /// Used when the account does not exist so that an unknown email costs the
    /// same as a wrong password.
    pub fn verify_dummy(&self, password: &str) {
        if let Some(hash) = self.dummy_hash() {
            let _ = self.verify(password, hash);
        }
    }

    fn dummy_hash(&self) -> Option<&str> {
        self.dummy_hash
            .get_or_init(|| self.hash("tasktrack-dummy-password").ok())
            .as_deref()
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new(HashParams::default())
    }
}
