//! Integration test support for Porchlight.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p porchlight-integration-tests
//! ```
//!
//! No external services are needed. [`FakeBackend`] serves the parts of the
//! hosted auth (`/auth/v1`) and data (`/rest/v1`) APIs the REST client uses,
//! on a random loopback port. Row-level security is emulated: a bearer token
//! only sees and writes rows whose `user_id` is its own.
//!
//! # Test Categories
//!
//! - `address_book` - Address store and adapter over the in-memory backends
//! - `identity` - Identity resolution over the in-memory backends
//! - `rest_backend` - Both services end to end against [`FakeBackend`]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, TimeDelta, Utc};
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use porchlight_client::{ClientConfig, ConfigError, Notifier};
use porchlight_core::NewAddress;

/// API key the fake backend accepts.
pub const ANON_KEY: &str = "anon-test-key";

type Record = Map<String, Value>;

// =============================================================================
// Fixtures
// =============================================================================

#[must_use]
pub fn elm_street() -> NewAddress {
    NewAddress {
        house_number: "12".into(),
        street: "Elm".into(),
        area: "Midtown".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        pin_code: "62704".into(),
        mobile: "555-0100".into(),
    }
}

#[must_use]
pub fn birch_lane() -> NewAddress {
    NewAddress {
        house_number: "7".into(),
        street: "Birch Lane".into(),
        area: "Old Town".into(),
        city: "Shelbyville".into(),
        state: "IL".into(),
        pin_code: "62565".into(),
        mobile: "555-0199".into(),
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// A notification as the user would have seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

/// Notifier that keeps everything it is told.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: StdMutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Drain the notifications recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .map(|mut seen| std::mem::take(&mut *seen))
            .unwrap_or_default()
    }

    fn push(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.push(Notification::Success(message.to_owned()));
    }

    fn error(&self, message: &str) {
        self.push(Notification::Error(message.to_owned()));
    }
}

// =============================================================================
// Fake Backend
// =============================================================================

struct Account {
    id: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct BackendState {
    accounts: Vec<Account>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Record>>,
    data_outage: bool,
    issued: u64,
    refresh_grants: usize,
    inserted: i64,
}

impl BackendState {
    fn principal(&self, headers: &HeaderMap) -> Option<String> {
        let token = bearer(headers)?;
        self.access_tokens.get(token).cloned()
    }

    fn email_of(&self, user_id: &str) -> Option<&str> {
        self.accounts
            .iter()
            .find(|account| account.id == user_id)
            .map(|account| account.email.as_str())
    }
}

type SharedState = Arc<Mutex<BackendState>>;

/// In-process stand-in for the hosted auth and data APIs.
///
/// The server task is aborted when the backend is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: SharedState,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind a loopback port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = SharedState::default();
        let router = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/user", get(user))
            .route("/auth/v1/logout", post(logout))
            .route("/rest/v1/{table}", get(select).post(insert))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the loopback URL is rejected.
    pub fn config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::new(&self.base_url(), SecretString::from(ANON_KEY))
    }

    /// Register an account and return its user id.
    pub async fn add_account(&self, email: &str, password: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.lock().await.accounts.push(Account {
            id: id.clone(),
            email: email.to_owned(),
            password: password.to_owned(),
        });
        id
    }

    /// Insert a row directly, bypassing row-level security.
    pub async fn seed(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.state
                .lock()
                .await
                .tables
                .entry(table.to_owned())
                .or_default()
                .push(row);
        }
    }

    /// Every row of `table`, regardless of owner.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make the data API answer `503` until switched off again.
    pub async fn set_data_outage(&self, down: bool) {
        self.state.lock().await.data_outage = down;
    }

    /// Number of `refresh_token` grants requested so far.
    pub async fn refresh_grants(&self) -> usize {
        self.state.lock().await.refresh_grants
    }

    /// Invalidate every issued access and refresh token.
    pub async fn revoke_sessions(&self) {
        let mut state = self.state.lock().await;
        state.access_tokens.clear();
        state.refresh_tokens.clear();
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn missing_key() -> Response {
    reply(
        StatusCode::UNAUTHORIZED,
        json!({"message": "No API key found in request"}),
    )
}

fn owned_by(row: &Record, user_id: &str) -> bool {
    row.get("user_id").and_then(Value::as_str) == Some(user_id)
}

/// Evaluate a `col=op.value` filter against a column value.
fn matches_filter(value: Option<&Value>, expr: &str) -> bool {
    match expr.split_once('.') {
        Some(("eq", expected)) => value.is_some_and(|value| match value {
            Value::String(s) => s == expected,
            other => other.to_string() == expected,
        }),
        Some(("is", "null")) => value.is_none_or(Value::is_null),
        _ => false,
    }
}

fn sort_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

async fn token(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !has_api_key(&headers) {
        return missing_key();
    }
    let field = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or_default();

    let mut state = state.lock().await;
    let user_id = match params.get("grant_type").map(String::as_str) {
        Some("password") => state
            .accounts
            .iter()
            .find(|a| a.email == field("email") && a.password == field("password"))
            .map(|a| a.id.clone()),
        Some("refresh_token") => {
            state.refresh_grants += 1;
            state.refresh_tokens.remove(field("refresh_token"))
        }
        _ => {
            return reply(
                StatusCode::BAD_REQUEST,
                json!({"error": "unsupported_grant_type"}),
            );
        }
    };
    let Some(user_id) = user_id else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
        );
    };

    state.issued += 1;
    let access_token = format!("access-{}", state.issued);
    let refresh_token = format!("refresh-{}", state.issued);
    state
        .access_tokens
        .insert(access_token.clone(), user_id.clone());
    state
        .refresh_tokens
        .insert(refresh_token.clone(), user_id.clone());

    reply(
        StatusCode::OK,
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": refresh_token,
            "user": {"id": user_id, "email": state.email_of(&user_id), "aud": "authenticated"},
        }),
    )
}

async fn user(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if !has_api_key(&headers) {
        return missing_key();
    }
    let state = state.lock().await;
    match state.principal(&headers) {
        Some(user_id) => reply(
            StatusCode::OK,
            json!({"id": user_id, "email": state.email_of(&user_id), "aud": "authenticated"}),
        ),
        None => reply(StatusCode::UNAUTHORIZED, json!({"msg": "invalid JWT"})),
    }
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = state.lock().await;
    let revoked = bearer(&headers).and_then(|token| state.access_tokens.remove(token));
    match revoked {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => reply(StatusCode::UNAUTHORIZED, json!({"msg": "invalid JWT"})),
    }
}

async fn select(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    if !has_api_key(&headers) {
        return missing_key();
    }
    let state = state.lock().await;
    if state.data_outage {
        return reply(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"message": "upstream unavailable"}),
        );
    }
    // Anonymous callers see nothing.
    let Some(principal) = state.principal(&headers) else {
        return reply(StatusCode::OK, json!([]));
    };

    let mut rows: Vec<&Record> = state
        .tables
        .get(&table)
        .map(|rows| rows.iter().filter(|row| owned_by(row, &principal)).collect())
        .unwrap_or_default();
    let mut limit = None;
    for (key, value) in &params {
        match key.as_str() {
            "select" => {}
            "order" => {
                let (column, direction) = value.rsplit_once('.').unwrap_or((value.as_str(), "asc"));
                rows.sort_by_cached_key(|row| sort_key(row.get(column)));
                if direction == "desc" {
                    rows.reverse();
                }
            }
            "limit" => limit = value.parse::<usize>().ok(),
            column => rows.retain(|row| matches_filter(row.get(column), value)),
        }
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }

    Json(rows.into_iter().cloned().collect::<Vec<_>>()).into_response()
}

async fn insert(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Record>>,
) -> Response {
    if !has_api_key(&headers) {
        return missing_key();
    }
    let mut state = state.lock().await;
    if state.data_outage {
        return reply(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"message": "upstream unavailable"}),
        );
    }
    let Some(principal) = state.principal(&headers) else {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"code": "42501", "message": "permission denied for table"}),
        );
    };
    if rows.iter().any(|row| !owned_by(row, &principal)) {
        return reply(
            StatusCode::FORBIDDEN,
            json!({
                "code": "42501",
                "message": "new row violates row-level security policy",
                "details": null,
            }),
        );
    }

    for mut row in rows {
        state.inserted += 1;
        let created_at = Utc::now() + TimeDelta::milliseconds(state.inserted);
        row.insert("id".into(), json!(Uuid::new_v4().to_string()));
        row.insert(
            "created_at".into(),
            json!(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        state.tables.entry(table.clone()).or_default().push(row);
    }
    StatusCode::CREATED.into_response()
}
