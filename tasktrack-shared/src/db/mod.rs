/// Database plumbing
///
/// - `pool`: PostgreSQL connection pool with a health check
/// - `migrations`: embedded schema migrations
///
/// Queries themselves live on the models; see [`crate::models`].

pub mod migrations;
pub mod pool;
