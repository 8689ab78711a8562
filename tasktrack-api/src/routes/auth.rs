/// Session endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/user/sign/up` - create an account
/// - `POST /api/v1/user/sign/in` - exchange credentials for a bearer token
/// - `GET /api/v1/user/sign/out` - end the presented token's session
/// - `GET /api/v1/user/sign/out/all` - end every session on the account
/// - `POST /api/v1/user/password` - change password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    routes::ApiResponse,
};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tasktrack_shared::auth::session::{NewAccount, SessionContext, SessionError};
use validator::Validate;

/// Sign-up request
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Ten digits
    #[validate(length(equal = 10, message = "Mobile number must be 10 digits"))]
    pub mobile: Option<String>,

    #[validate(length(min = 8, max = 20, message = "Password must be 8 to 20 characters"))]
    pub password: String,
}

/// Sign-up response
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub id: String,
    pub email: String,
}

/// Sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Sign-in response
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    /// Bearer token for the `Authorization` header
    pub access: String,

    pub token_type: String,

    /// Seconds until the token expires
    pub expires_in: i64,
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub old_password: String,

    #[validate(length(min = 8, max = 20, message = "Password must be 8 to 20 characters"))]
    pub new_password: String,
}

/// Registers a new account
///
/// # Errors
///
/// - `422 Unprocessable Entity`: validation failed
/// - `409 Conflict`: email already registered
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SignUpResponse>>)> {
    let Json(req) = payload?;
    req.validate()?;

    if let Some(mobile) = &req.mobile {
        if !mobile.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "mobile".to_string(),
                message: "Mobile number must be 10 digits".to_string(),
            }]));
        }
    }

    let account = state
        .sessions
        .register(NewAccount {
            email: req.email,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            mobile: req.mobile,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_data(
            "User created successfully",
            SignUpResponse {
                id: account.id.to_string(),
                email: account.email,
            },
        ),
    ))
}

/// Signs in and returns a new bearer token
///
/// Unknown email and wrong password both answer
/// `401 {"error": true, "message": "Incorrect email or password"}`.
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<SignInResponse>>> {
    let Json(req) = payload?;
    req.validate()?;

    let access = state.sessions.sign_in(&req.email, &req.password).await?;

    Ok(ApiResponse::with_data(
        "User signed in successfully",
        SignInResponse {
            access,
            token_type: "Bearer".to_string(),
            expires_in: state.sessions.issuer().lifetime().num_seconds(),
        },
    ))
}

/// Ends the session for the token on this request
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state
        .sessions
        .sign_out(&session.account, &session.token)
        .await?;

    Ok(ApiResponse::message("User signed out successfully"))
}

/// Ends every session on the caller's account
pub async fn sign_out_all(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.sessions.sign_out_all(&session.account).await?;

    Ok(ApiResponse::message("User signed out of all devices successfully"))
}

/// Changes the caller's password
///
/// # Errors
///
/// - `401 Unauthorized`: current password is wrong
/// - `422 Unprocessable Entity`: new password fails validation
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let Json(req) = payload?;
    req.validate()?;

    state
        .sessions
        .change_password(&session.account, &req.old_password, &req.new_password)
        .await
        .map_err(|e| match e {
            SessionError::WrongPassword => ApiError::Unauthorized("Incorrect password".to_string()),
            other => other.into(),
        })?;

    Ok(ApiResponse::message("Password changed successfully"))
}
