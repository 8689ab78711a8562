/// API route handlers
///
/// Organized by resource:
///
/// - `health`: welcome and health check
/// - `auth`: sign up, sign in, sign out, password change
/// - `profile`: the caller's own account
/// - `avatar`: avatar upload and download
/// - `tasks`: task CRUD and partial updates
///
/// Every JSON response uses [`ApiResponse`]; errors use the same shape via
/// [`crate::error::ApiError`].

use axum::Json;
use serde::{Deserialize, Serialize};

pub mod auth;
pub mod avatar;
pub mod health;
pub mod profile;
pub mod tasks;

/// Success envelope
///
/// ```json
/// { "error": false, "message": "Task created successfully", "data": { ... } }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always false
    pub error: bool,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Envelope carrying a payload
    pub fn with_data(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            error: false,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    /// Envelope with only a message
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            error: false,
            message: message.into(),
            data: None,
        })
    }
}
