//! Unified application error model and mapping helpers.
//! One error enum is shared by the session holder, the route guard, the HTTP gate
//! and the CLI. Token and storage failures start life as the narrower `TokenError`
//! and `StorageError` types and are folded into `AppError` at module boundaries.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    NoToken { code: String, message: String },
    InvalidToken { code: String, message: String },
    Unauthorized { code: String, message: String },
    CredentialExchange { code: String, message: String },
    Config { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::NoToken { code, .. }
            | AppError::InvalidToken { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::CredentialExchange { code, .. }
            | AppError::Config { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::NoToken { message, .. }
            | AppError::InvalidToken { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::CredentialExchange { message, .. }
            | AppError::Config { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn no_token<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NoToken { code: code.into(), message: msg.into() } }
    pub fn invalid_token<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::InvalidToken { code: code.into(), message: msg.into() } }
    pub fn unauthorized<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn exchange<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::CredentialExchange { code: code.into(), message: msg.into() } }
    pub fn config<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn io<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::NoToken { .. } => 401,
            AppError::InvalidToken { .. } => 401,
            AppError::Unauthorized { .. } => 403,
            AppError::CredentialExchange { .. } => 502,
            AppError::Config { .. } => 500,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// True for the three conditions the route guard resolves by redirecting.
    pub fn is_access_denial(&self) -> bool {
        matches!(self, AppError::NoToken { .. } | AppError::InvalidToken { .. } | AppError::Unauthorized { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal { code: "internal_error".into(), message: other.to_string() },
        }
    }
}

impl From<crate::identity::TokenError> for AppError {
    fn from(err: crate::identity::TokenError) -> Self {
        AppError::InvalidToken { code: err.code().into(), message: err.to_string() }
    }
}

impl From<crate::session::StorageError> for AppError {
    fn from(err: crate::session::StorageError) -> Self {
        AppError::Io { code: "storage_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
