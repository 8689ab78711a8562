/// Profile endpoint
///
/// `GET /api/v1/user/profile` returns the signed-in account without its
/// password hash or token list.

use crate::routes::ApiResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tasktrack_shared::{auth::session::SessionContext, models::account::Account};

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: Option<String>,

    /// Public URL of the avatar image
    pub avatar: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Account> for ProfileResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            email: account.email.clone(),
            mobile: account.mobile.clone(),
            avatar: format!("/api/v1/user/avatar/{}", account.id),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

pub async fn get_profile(
    Extension(session): Extension<SessionContext>,
) -> Json<ApiResponse<ProfileResponse>> {
    ApiResponse::with_data("User profile", ProfileResponse::from(&session.account))
}
