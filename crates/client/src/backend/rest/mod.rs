//! HTTP backend for hosted Postgres stacks.
//!
//! [`RestClient`] implements both collaborator traits:
//!
//! - [`SessionProvider`] against a GoTrue-style auth API
//!   (`/auth/v1/token`, `/auth/v1/user`, `/auth/v1/logout`)
//! - [`RecordStore`] against a PostgREST-style data API (`/rest/v1/{table}`)
//!
//! Data requests carry the signed-in user's access token, so row-level
//! security on the server sees the same principal the client resolved.
//!
//! # Example
//!
//! ```rust,ignore
//! use porchlight_client::{ClientConfig, RestClient};
//!
//! let config = ClientConfig::from_env()?;
//! let client = RestClient::new(&config)?;
//! client.sign_in_with_password(&email, &password).await?;
//! let rows = client.select(&Select::from("addresses")).await?;
//! ```

mod types;

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use url::Url;

use porchlight_core::Email;

use crate::config::ClientConfig;
use crate::error::{SessionError, StoreError};
use crate::session::{Session, SessionProvider, SessionUser};
use crate::store::{RecordStore, Row, Select, at_most_one};

use types::{AuthUser, ErrorBody, PasswordGrant, RefreshGrant, TokenResponse};

/// Auth API prefix, relative to the base URL.
const AUTH_PATH: &str = "auth/v1/";
/// Data API prefix, relative to the base URL.
const REST_PATH: &str = "rest/v1/";

/// Client for the hosted auth and data APIs.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    /// In-memory session cache
    session: RwLock<Option<Session>>,
    /// Held while a refresh grant is in flight; refresh tokens are single-use.
    refresh_lock: Mutex<()>,
}

impl RestClient {
    /// Create a client with no session.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestClientInner {
                http,
                base_url: config.base_url.clone(),
                api_key: config.anon_key.clone(),
                session: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// Install a previously obtained session (e.g. loaded from storage).
    pub async fn restore_session(&self, session: Session) {
        *self.inner.session.write().await = Some(session);
    }

    async fn clear_session(&self) {
        *self.inner.session.write().await = None;
    }

    /// Refresh an expired session. Concurrent callers queue on the refresh
    /// lock and reuse the session renewed by whoever went first.
    async fn renew_session(&self) -> Result<Option<Session>, SessionError> {
        let _refreshing = self.inner.refresh_lock.lock().await;

        let current = self.inner.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }
        let Some(refresh_token) = session.refresh_token else {
            self.clear_session().await;
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(renewed) => {
                *self.inner.session.write().await = Some(renewed.clone());
                Ok(Some(renewed))
            }
            Err(SessionError::InvalidCredentials) => {
                let mut cached = self.inner.session.write().await;
                // A sign-in may have replaced the session meanwhile.
                let still_current = cached
                    .as_ref()
                    .and_then(|s| s.refresh_token.as_ref())
                    .is_some_and(|t| t.expose_secret() == refresh_token.expose_secret());
                if still_current {
                    tracing::info!("Refresh token rejected; session ended");
                    *cached = None;
                }
                Ok(cached.clone())
            }
            Err(error) => Err(error),
        }
    }

    // =========================================================================
    // Request Helpers
    // =========================================================================

    fn auth_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        self.inner.base_url.join(AUTH_PATH)?.join(endpoint)
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        if !is_valid_identifier(table) {
            return Err(StoreError::InvalidQuery(format!(
                "illegal table name: {table:?}"
            )));
        }
        self.inner
            .base_url
            .join(REST_PATH)
            .and_then(|url| url.join(table))
            .map_err(|e| StoreError::InvalidQuery(e.to_string()))
    }

    /// Attach the API key and a bearer token.
    fn authorize(&self, request: RequestBuilder, bearer: &SecretString) -> RequestBuilder {
        request
            .header("apikey", self.inner.api_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    /// Bearer for data requests: the session token when signed in, otherwise
    /// the anonymous key.
    async fn data_bearer(&self) -> SecretString {
        match self.session().await {
            Ok(Some(session)) => session.access_token,
            Ok(None) => self.inner.api_key.clone(),
            Err(error) => {
                tracing::warn!(%error, "Session refresh failed; querying anonymously");
                self.inner.api_key.clone()
            }
        }
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &SecretString) -> Result<Session, SessionError> {
        let url = self.auth_url("token").map_err(|e| SessionError::Status {
            status: 0,
            message: e.to_string(),
        })?;
        let response = self
            .authorize(self.inner.http.post(url), &self.inner.api_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant {
                refresh_token: refresh_token.expose_secret(),
            })
            .send()
            .await?;

        read_token_response(response).await
    }

    async fn fetch_rows(&self, query: &Select, limit: Option<usize>) -> Result<Vec<Row>, StoreError> {
        let url = self.table_url(query.table())?;
        let mut params: Vec<(String, String)> = vec![("select".into(), "*".into())];
        for filter in query.filters() {
            params.push((filter.column.clone(), filter_literal(&filter.value)));
        }
        if let Some(order) = query.ordering() {
            params.push((
                "order".into(),
                format!("{}.{}", order.column, order.direction.as_str()),
            ));
        }
        if let Some(limit) = limit {
            params.push(("limit".into(), limit.to_string()));
        }

        let bearer = self.data_bearer().await;
        let response = self
            .authorize(self.inner.http.get(url), &bearer)
            .query(&params)
            .send()
            .await?;

        let response = check_store_status(response).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session Provider
// =============================================================================

impl SessionProvider for RestClient {
    async fn session(&self) -> Result<Option<Session>, SessionError> {
        let current = self.inner.session.read().await.clone();
        match current {
            Some(session) if !session.is_expired() => Ok(Some(session)),
            Some(_) => self.renew_session().await,
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn user(&self) -> Result<Option<SessionUser>, SessionError> {
        let Some(session) = self.session().await? else {
            return Ok(None);
        };
        let url = self.auth_url("user").map_err(|e| SessionError::Status {
            status: 0,
            message: e.to_string(),
        })?;

        let response = self
            .authorize(self.inner.http.get(url), &session.access_token)
            .send()
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::info!(%status, "Access token rejected; session ended");
            self.clear_session().await;
            return Ok(None);
        }
        if !status.is_success() {
            return Err(session_status_error(response).await);
        }

        let user: AuthUser = response.json().await?;
        Ok(Some(user.into()))
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, SessionError> {
        let url = self.auth_url("token").map_err(|e| SessionError::Status {
            status: 0,
            message: e.to_string(),
        })?;
        let response = self
            .authorize(self.inner.http.post(url), &self.inner.api_key)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant {
                email: email.as_str(),
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let session = read_token_response(response).await?;
        *self.inner.session.write().await = Some(session.clone());
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), SessionError> {
        let Some(session) = self.inner.session.write().await.take() else {
            return Ok(());
        };
        let url = self.auth_url("logout").map_err(|e| SessionError::Status {
            status: 0,
            message: e.to_string(),
        })?;

        let response = self
            .authorize(self.inner.http.post(url), &session.access_token)
            .send()
            .await?;

        // An already-invalid token means the session is over either way.
        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(session_status_error(response).await)
        }
    }
}

// =============================================================================
// Record Store
// =============================================================================

impl RecordStore for RestClient {
    #[instrument(skip(self), fields(table = %query.table()))]
    async fn select(&self, query: &Select) -> Result<Vec<Row>, StoreError> {
        self.fetch_rows(query, None).await
    }

    #[instrument(skip(self), fields(table = %query.table()))]
    async fn select_one(&self, query: &Select) -> Result<Option<Row>, StoreError> {
        // Two rows are enough to tell "one" from "several".
        let rows = self.fetch_rows(query, Some(2)).await?;
        at_most_one(query.table(), rows)
    }

    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let url = self.table_url(table)?;
        let bearer = self.data_bearer().await;
        let response = self
            .authorize(self.inner.http.post(url), &bearer)
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;

        check_store_status(response).await?;
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Table names may only contain ASCII alphanumerics, `_` and `.`.
fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Render an equality filter in PostgREST operator syntax.
fn filter_literal(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

async fn read_token_response(response: Response) -> Result<Session, SessionError> {
    let status = response.status();
    if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .unwrap_or_default()
            .message_or(&body);
        tracing::debug!(%status, %message, "Token grant refused");
        return Err(SessionError::InvalidCredentials);
    }
    if !status.is_success() {
        return Err(session_status_error(response).await);
    }

    let token: TokenResponse = response.json().await?;
    Ok(token.into_session())
}

async fn session_status_error(response: Response) -> SessionError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .unwrap_or_default()
        .message_or(&body);
    SessionError::Status { status, message }
}

async fn check_store_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .unwrap_or_default()
        .message_or(&body);
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}
