//! Shared harness for store integration tests.
//!
//! Each backend is exercised against an in-process emulator of its REST API
//! and OAuth2 token endpoint, served by axum on an ephemeral port.

#![allow(dead_code)]

pub mod dropbox;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cloudstore_store::{TokenStore, Tokens};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
/// Authorization code the token endpoint accepts.
pub const VALID_CODE: &str = "good-code";
/// Refresh token the token endpoint refuses.
pub const REVOKED_REFRESH: &str = "revoked";
/// Access token every emulator accepts from the start.
pub const SEEDED_ACCESS: &str = "seeded-access";

/// Access tokens issued by the emulated authorization server.
#[derive(Default)]
pub struct AuthState {
    valid: Mutex<HashSet<String>>,
    issued: AtomicUsize,
    pub refreshes: AtomicUsize,
}

impl AuthState {
    pub fn new() -> Arc<Self> {
        let auth = Arc::new(Self::default());
        auth.grant(SEEDED_ACCESS);
        auth
    }

    pub fn grant(&self, token: &str) {
        self.valid.lock().unwrap().insert(token.to_string());
    }

    /// Whether the request carries a bearer token issued by this server.
    pub fn check(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.valid.lock().unwrap().contains(token))
    }

    fn issue(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let token = format!("issued-access-{}", n);
        self.grant(&token);
        token
    }
}

async fn token_endpoint(
    State(auth): State<Arc<AuthState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let field = |name: &str| form.get(name).map(String::as_str);

    if field("client_id") != Some(CLIENT_ID) || field("client_secret") != Some(CLIENT_SECRET) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }

    match field("grant_type") {
        Some("authorization_code") if field("code") == Some(VALID_CODE) => Json(json!({
            "access_token": auth.issue(),
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "issued-refresh",
        }))
        .into_response(),
        Some("refresh_token")
            if field("refresh_token").is_some_and(|t| !t.is_empty() && t != REVOKED_REFRESH) =>
        {
            auth.refreshes.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "access_token": auth.issue(),
                "token_type": "bearer",
                "expires_in": 3600,
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        )
            .into_response(),
    }
}

/// Router for the emulated OAuth2 token endpoint at `/token`.
pub fn token_routes(auth: Arc<AuthState>) -> Router {
    Router::new()
        .route("/token", post(token_endpoint))
        .with_state(auth)
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Persist tokens for `{provider}_token_{name}.json` in `dir`.
pub async fn seed_tokens(dir: &Path, provider: &str, name: &str, access: &str, expired: bool, refresh: Option<&str>) {
    let expires_at = if expired {
        Utc::now() - Duration::hours(1)
    } else {
        Utc::now() + Duration::hours(1)
    };
    TokenStore::new(dir, provider, name)
        .save(&Tokens {
            access_token: access.to_string(),
            refresh_token: refresh.map(String::from),
            expires_at: Some(expires_at),
            scopes: Vec::new(),
        })
        .await
        .unwrap();
}

/// Read back the persisted tokens.
pub fn load_tokens(dir: &Path, provider: &str, name: &str) -> Tokens {
    TokenStore::new(dir, provider, name).load().unwrap()
}

/// Extract the `state` query parameter from a consent URL.
pub fn state_of(authorization_url: &str) -> String {
    url::Url::parse(authorization_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}
