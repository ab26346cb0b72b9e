//! API client for communicating with the FlexNAS management API.
//!
//! This module provides the `ApiClient` struct, which performs the login
//! call for `SessionStore` and makes authenticated requests for the
//! console's data.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthGrant, Authenticator, LoginError, SessionStore};
use crate::models::{SystemStatus, Volume};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Authentication endpoint, relative to the server URL
const LOGIN_ENDPOINT: &str = "/api/login";

const SYSTEM_STATUS_ENDPOINT: &str = "/api/system-status";

const VOLUMES_ENDPOINT: &str = "/api/volumes";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
    user: Option<String>,
    role: Option<String>,
}

/// API client for a FlexNAS appliance.
/// Clone is cheap - reqwest::Client and the session are both reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a client for `base_url` whose requests carry `session`'s token
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Log in through this client's server and adopt the resulting token
    pub async fn login(&self, username: &str, password: &str) -> Result<(), LoginError> {
        self.session.login(self, username, password).await
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Attach the session's current token, if any. Read on every request so
    /// a logout takes effect for the very next call.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn parse_login_response(body: &str) -> Result<AuthGrant, LoginError> {
        let parsed: LoginResponse = serde_json::from_str(body)
            .map_err(|e| LoginError::MalformedResponse(format!("not valid JSON: {}", e)))?;

        match parsed.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(AuthGrant {
                access_token,
                user: parsed.user,
                role: parsed.role,
            }),
            _ => Err(LoginError::MalformedResponse(
                "no access_token in response".to_string(),
            )),
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let url = self.url(endpoint);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .authorize(self.client.get(&url))
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch CPU, memory and storage utilization
    pub async fn fetch_system_status(&self) -> Result<SystemStatus, ApiError> {
        self.get(SYSTEM_STATUS_ENDPOINT).await
    }

    /// Fetch mounted storage volumes
    pub async fn fetch_volumes(&self) -> Result<Vec<Volume>, ApiError> {
        let volumes: Vec<Volume> = self.get(VOLUMES_ENDPOINT).await?;
        debug!(count = volumes.len(), "Fetched volumes");
        Ok(volumes)
    }
}

impl Authenticator for ApiClient {
    /// POST the credentials to the login endpoint. Makes exactly one attempt.
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthGrant, LoginError> {
        let url = self.url(LOGIN_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(LoginError::Network)?;

        let response = Self::check_response(response).await?;
        let body = response.text().await.map_err(LoginError::Network)?;

        Self::parse_login_response(&body)
    }
}
