/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tasktrack_api::{app::{build_router, AppState}, config::Config};
/// use tasktrack_shared::store::memory::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tasktrack_shared::{
    auth::{
        jwt::TokenIssuer,
        password::CredentialVerifier,
        session::{SessionError, SessionManager},
    },
    store::Store,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart framing on top of the avatar itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
///
/// Cloned into every handler through `State`; all fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,

    pub sessions: Arc<SessionManager>,

    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the token issuer, password verifier and session manager from
    /// `config` around one store
    pub fn new<S: Store + 'static>(store: Arc<S>, config: Config) -> Self {
        let issuer = TokenIssuer::with_lifetime(&config.auth.jwt_secret, config.auth.token_lifetime);
        let verifier = CredentialVerifier::new(config.auth.hash_params);

        let sessions = SessionManager::new(store.clone(), issuer, verifier)
            .revoke_sessions_on_password_change(config.auth.revoke_sessions_on_password_change);

        Self {
            store,
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete router
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /                              # welcome (public)
/// ├── GET  /health                        # health (public)
/// └── /api/v1/
///     ├── user/
///     │   ├── POST   sign/up              # public
///     │   ├── POST   sign/in              # public
///     │   ├── GET    sign/out             # session
///     │   ├── GET    sign/out/all         # session
///     │   ├── GET    profile              # session
///     │   ├── POST   password             # session
///     │   ├── POST   avatar               # session
///     │   ├── GET    avatar               # session
///     │   ├── DELETE avatar               # session
///     │   └── GET    avatar/:id           # public
///     └── task/
///         ├── POST   /                    # session
///         ├── GET    /                    # session
///         ├── GET    :id                  # session
///         ├── PATCH  :id                  # session
///         └── DELETE :id                  # session
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS
/// 3. Logging (tower-http TraceLayer)
/// 4. Session authentication (private routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, avatar, health, profile, tasks};

    let public_routes = Router::new()
        .route("/", get(health::welcome))
        .route("/health", get(health::health_check))
        .route("/api/v1/user/sign/up", post(auth::sign_up))
        .route("/api/v1/user/sign/in", post(auth::sign_in))
        .route("/api/v1/user/avatar/:id", get(avatar::get_avatar_by_id));

    let private_routes = Router::new()
        .route("/api/v1/user/sign/out", get(auth::sign_out))
        .route("/api/v1/user/sign/out/all", get(auth::sign_out_all))
        .route("/api/v1/user/profile", get(profile::get_profile))
        .route("/api/v1/user/password", post(auth::change_password))
        .route(
            "/api/v1/user/avatar",
            post(avatar::upload_avatar)
                .get(avatar::get_avatar)
                .delete(avatar::delete_avatar)
                .layer(DefaultBodyLimit::max(
                    state.config.avatar.max_bytes + MULTIPART_OVERHEAD,
                )),
        )
        .route("/api/v1/task", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/v1/task/:id",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route_layer(from_fn_with_state(state.clone(), session_auth_layer));

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Session authentication middleware
///
/// Resolves the `Authorization` header to a [`SessionContext`] and inserts it
/// into the request extensions. Any failure answers 401.
///
/// [`SessionContext`]: tasktrack_shared::auth::session::SessionContext
async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::from(SessionError::MalformedHeader))?
                .to_string(),
        ),
    };

    let session = state.sessions.authenticate(raw.as_deref()).await?;

    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tasktrack_shared::store::memory::MemoryStore;

    fn test_config() -> Config {
        Config::from_lookup(|key| match key {
            "STORE_BACKEND" => Some("memory".to_string()),
            "JWT_SECRET" => Some("test-secret-key-at-least-32-bytes-long".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_app_state_shares_store() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store, test_config());

        assert_eq!(state.store.backend_name(), "memory");
        assert_eq!(
            state.sessions.issuer().lifetime(),
            chrono::Duration::hours(72)
        );
    }
}
