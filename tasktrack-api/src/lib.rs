//! # TaskTrack API Server Library
//!
//! HTTP surface for TaskTrack: accounts with bearer-token sessions,
//! owner-scoped tasks and profile avatars.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `middleware`: response security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
