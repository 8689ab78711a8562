//! Common test utilities for API tests
//!
//! Every test gets its own router over a fresh in-memory store, with light
//! password hashing so sign-ins stay fast.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tasktrack_api::app::{build_router, AppState};
use tasktrack_api::config::Config;
use tasktrack_shared::store::memory::MemoryStore;
use tower::Service as _;

pub const PASSWORD: &str = "password123";

const BOUNDARY: &str = "tasktrack-test-boundary";

/// Test context containing the router and its store
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Builds a context with extra environment-style overrides
    pub fn with_vars(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "integration-test-secret-at-least-32-bytes"),
            ("PASSWORD_HASH_MEMORY_KIB", "1024"),
            ("PASSWORD_HASH_ITERATIONS", "1"),
            ("PASSWORD_HASH_PARALLELISM", "1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }

        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let app = build_router(AppState::new(store.clone(), config.clone()));

        Self { app, store, config }
    }

    /// Sends a request and returns the raw response
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().call(request).await.unwrap()
    }

    /// Sends a JSON request and returns the status and decoded body
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    /// Registers an account with [`PASSWORD`]
    pub async fn sign_up(&self, email: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/api/v1/user/sign/up",
            None,
            Some(json!({
                "first_name": "Test",
                "last_name": "User",
                "email": email,
                "password": PASSWORD,
            })),
        )
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/api/v1/user/sign/in",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Registers and signs in, returning the bearer token
    pub async fn signed_in(&self, email: &str) -> String {
        let (status, body) = self.sign_up(email).await;
        assert_eq!(status, StatusCode::CREATED, "sign up failed: {}", body);

        let (status, body) = self.sign_in(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "sign in failed: {}", body);

        body["data"]["access"].as_str().unwrap().to_string()
    }

    /// Creates a task and returns its id
    pub async fn create_task(&self, token: &str, body: Value) -> String {
        let (status, body) = self
            .json(Method::POST, "/api/v1/task", Some(token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", body);

        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Uploads `data` as the multipart `field` named `file_name`
    pub async fn upload(
        &self,
        token: &str,
        field: &str,
        file_name: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/user/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, file_name, data)))
            .unwrap();

        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }
}

pub async fn read_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = read_bytes(response).await;
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// A single-part multipart/form-data body
pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
