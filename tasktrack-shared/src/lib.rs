//! # TaskTrack Shared Library
//!
//! Domain types, persistence and session logic used by the TaskTrack API
//! server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, bearer tokens and sessions
//! - `db`: PostgreSQL pool and migrations
//! - `models`: accounts, tasks, avatars and partial task updates
//! - `store`: storage traits with PostgreSQL and in-memory backends

pub mod auth;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the TaskTrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
