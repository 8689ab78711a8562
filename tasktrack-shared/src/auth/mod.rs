/// Authentication
///
/// # Modules
///
/// - [`password`]: Argon2id hashing behind [`password::CredentialVerifier`]
/// - [`jwt`]: HS256 bearer tokens behind [`jwt::TokenIssuer`]
/// - [`session`]: sign-in, request authentication and sign-out
///
/// Both the issuer and the verifier are values built at startup and passed to
/// the [`session::SessionManager`]; there is no global key or hasher.

pub mod jwt;
pub mod password;
pub mod session;
