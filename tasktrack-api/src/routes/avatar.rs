/// Avatar endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/user/avatar` - upload (multipart field `avatar`, PNG or JPEG)
/// - `GET /api/v1/user/avatar` - the caller's avatar
/// - `DELETE /api/v1/user/avatar` - remove the caller's avatar
/// - `GET /api/v1/user/avatar/:id` - any account's avatar, no auth
///
/// Images are served with their SHA-256 as a strong ETag. A matching
/// `If-None-Match` answers `304 Not Modified` with no body.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::ApiResponse,
};
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::BytesMut;
use chrono::Utc;
use serde::Serialize;
use tasktrack_shared::{
    auth::session::SessionContext,
    models::avatar::{Avatar, AvatarFormat},
};
use uuid::Uuid;

/// Multipart field carrying the image
pub const AVATAR_FIELD: &str = "avatar";

/// Upload response
#[derive(Debug, Serialize)]
pub struct AvatarUploadResponse {
    pub url: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub checksum: String,
}

/// Stores the uploaded image, replacing any previous one
///
/// # Errors
///
/// - `400 Bad Request`: no `avatar` field, unsupported extension, or the
///   file is larger than the configured maximum
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ApiResponse<AvatarUploadResponse>>> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let max_bytes = state.config.avatar.max_bytes;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let format = field
            .file_name()
            .and_then(AvatarFormat::from_file_name)
            .ok_or_else(|| ApiError::BadRequest("Invalid file type".to_string()))?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError::BadRequest(too_large_message(max_bytes)));
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(ApiError::BadRequest("Avatar file is empty".to_string()));
        }

        let owner_id = session.account.id;
        let avatar = Avatar::new(
            owner_id,
            data.freeze(),
            format.content_type(),
            Utc::now().timestamp(),
        );

        let response = AvatarUploadResponse {
            url: format!("/api/v1/user/avatar/{}", owner_id),
            content_type: avatar.content_type.clone(),
            size_bytes: avatar.size_bytes(),
            checksum: avatar.checksum.clone(),
        };

        state.store.put_avatar(avatar).await?;

        tracing::info!(
            account_id = %owner_id,
            size_bytes = response.size_bytes,
            "Avatar uploaded"
        );

        return Ok(ApiResponse::with_data("Avatar uploaded successfully", response));
    }

    Err(ApiError::BadRequest(format!(
        "Missing '{}' file field",
        AVATAR_FIELD
    )))
}

/// Serves the caller's avatar
pub async fn get_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve_avatar(&state, session.account.id, &headers).await
}

/// Serves any account's avatar by id
pub async fn get_avatar_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let owner_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest("Invalid user ID".to_string()))?;

    serve_avatar(&state, owner_id, &headers).await
}

pub async fn delete_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.store.delete_avatar(session.account.id).await? {
        return Err(ApiError::NotFound("Avatar not found".to_string()));
    }

    Ok(ApiResponse::message("Avatar deleted successfully"))
}

async fn serve_avatar(state: &AppState, owner_id: Uuid, headers: &HeaderMap) -> ApiResult<Response> {
    let avatar = state
        .store
        .find_avatar(owner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Avatar not found".to_string()))?;

    let etag = format!("\"{}\"", avatar.checksum);
    let etag_value = HeaderValue::from_str(&etag)
        .map_err(|e| ApiError::InternalError(format!("Invalid ETag: {}", e)))?;
    let cache_control = HeaderValue::from_static("public, max-age=31536000");

    if etag_matches(headers, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, etag_value), (header::CACHE_CONTROL, cache_control)],
        )
            .into_response());
    }

    let content_type = HeaderValue::from_str(&avatar.content_type)
        .map_err(|e| ApiError::InternalError(format!("Invalid content type: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(avatar.size_bytes())),
            (header::ETAG, etag_value),
            (header::CACHE_CONTROL, cache_control),
        ],
        Body::from(avatar.data),
    )
        .into_response())
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag))
}

fn too_large_message(max_bytes: usize) -> String {
    if max_bytes >= 1024 * 1024 && max_bytes % (1024 * 1024) == 0 {
        format!("File size too large, max {}MB allowed", max_bytes / (1024 * 1024))
    } else if max_bytes >= 1024 && max_bytes % 1024 == 0 {
        format!("File size too large, max {}KB allowed", max_bytes / 1024)
    } else {
        format!("File size too large, max {} bytes allowed", max_bytes)
    }
}
