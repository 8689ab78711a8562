/// Middleware modules for the API server
///
/// - `security`: security response headers
///
/// Session authentication is an `axum::middleware::from_fn` layer defined
/// next to the router in [`crate::app`].

pub mod security;
