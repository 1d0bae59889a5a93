use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::TokenPair;

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("email", &self.email).field("password", &"<redacted>").finish()
    }
}

/// The one network operation the session holder depends on: trade credentials for
/// an opaque bearer token, or fail with a message fit for the login screen.
pub trait CredentialExchange: Send + Sync {
    fn exchange(&self, credentials: &Credentials) -> impl Future<Output = AppResult<String>> + Send;
}

/// Credential exchange against the clinic REST API (`POST /auth/login`).
#[derive(Clone)]
pub struct HttpCredentialExchange {
    base: Url,
    client: reqwest::Client,
}

pub const LOGIN_ENDPOINT: &str = "/auth/login";

impl HttpCredentialExchange {
    pub fn new(base: &str, timeout: Duration) -> AppResult<Self> {
        let base = Url::parse(base).map_err(|e| AppError::config("invalid_api_base", format!("invalid API base URL '{}': {}", base, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal("http_client", e.to_string()))?;
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url { &self.base }
}

/// Pull a human-readable message out of an API error body. The API answers
/// `{"detail": "..."}`, or a list of validation errors each with a `msg`.
fn error_message(status: reqwest::StatusCode, body: &serde_json::Value) -> String {
    match body.get("detail") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Array(items)) => {
            let msgs: Vec<&str> = items.iter().filter_map(|i| i.get("msg").and_then(|m| m.as_str())).collect();
            if msgs.is_empty() { format!("login failed: HTTP {}", status) } else { msgs.join("; ") }
        }
        _ => format!("login failed: HTTP {}", status),
    }
}

impl CredentialExchange for HttpCredentialExchange {
    async fn exchange(&self, credentials: &Credentials) -> AppResult<String> {
        let url = self.base.join(LOGIN_ENDPOINT).map_err(|e| AppError::config("invalid_api_base", e.to_string()))?;
        let resp = self.client
            .post(url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "session", "credential exchange transport error: {}", e);
                AppError::exchange("login_unreachable", format!("could not reach the login service: {}", e))
            })?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::json!({}));
        if !status.is_success() {
            let msg = error_message(status, &body);
            info!(target: "session", "credential exchange rejected: status={} email={}", status, credentials.email);
            return Err(AppError::exchange("login_rejected", msg));
        }
        let pair: TokenPair = serde_json::from_value(body)
            .map_err(|e| AppError::exchange("login_bad_response", format!("unexpected login response: {}", e)))?;
        if pair.access_token.trim().is_empty() {
            return Err(AppError::exchange("login_bad_response", "login response carried an empty token"));
        }
        Ok(pair.access_token)
    }
}
