//!
//! clinic-gate configuration
//! -------------------------
//! Defaults, overridden by `CLINIC_GATE_*` environment variables, overridden by
//! command-line flags. Shared by the gate server and the CLI.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::identity::{Hs256Decoder, TokenDecoder, TokenIssuer, UnverifiedDecoder};

pub const ENV_PREFIX: &str = "CLINIC_GATE_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub http_port: u16,
    pub bind: String,
    pub api_base: String,
    pub jwt_secret: Option<String>,
    pub token_file: PathBuf,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub storage_poll_ms: u64,
    /// Explicit override; when unset, verification follows `jwt_secret`.
    pub verify_tokens: Option<bool>,
    pub login_path: String,
    pub request_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            bind: "0.0.0.0".into(),
            api_base: "http://127.0.0.1:8000".into(),
            jwt_secret: None,
            token_file: PathBuf::from(".clinic_gate/storage.json"),
            access_ttl_minutes: 60,
            refresh_ttl_days: 7,
            storage_poll_ms: 1000,
            verify_tokens: None,
            login_path: "/login".into(),
            request_timeout_secs: 15,
        }
    }
}

pub fn parse_port_env(name: &str) -> Option<u16> {
    env::var(name).ok().and_then(|v| v.trim().parse::<u16>().ok())
}

pub fn parse_bool_env(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| parse_bool(&v))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_num_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn string_env(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Value following `flag`, if present.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> AppResult<Option<T>> {
    match flag_value(args, flag) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::config("bad_flag", format!("invalid value '{}' for {}", v, flag))),
    }
}

impl GateConfig {
    /// Defaults overridden by environment.
    pub fn from_env() -> Self {
        let key = |k: &str| format!("{}{}", ENV_PREFIX, k);
        let mut cfg = Self::default();
        if let Some(p) = parse_port_env(&key("HTTP_PORT")) { cfg.http_port = p; }
        if let Some(v) = string_env(&key("BIND")) { cfg.bind = v; }
        if let Some(v) = string_env(&key("API_BASE")) { cfg.api_base = v; }
        if let Some(v) = string_env(&key("JWT_SECRET")) { cfg.jwt_secret = Some(v); }
        if let Some(v) = string_env(&key("TOKEN_FILE")) { cfg.token_file = PathBuf::from(v); }
        if let Some(v) = parse_num_env(&key("ACCESS_TTL_MINUTES")) { cfg.access_ttl_minutes = v; }
        if let Some(v) = parse_num_env(&key("REFRESH_TTL_DAYS")) { cfg.refresh_ttl_days = v; }
        if let Some(v) = parse_num_env(&key("STORAGE_POLL_MS")) { cfg.storage_poll_ms = v; }
        if let Some(v) = parse_bool_env(&key("VERIFY_TOKENS")) { cfg.verify_tokens = Some(v); }
        if let Some(v) = string_env(&key("LOGIN_PATH")) { cfg.login_path = v; }
        if let Some(v) = parse_num_env(&key("REQUEST_TIMEOUT_SECS")) { cfg.request_timeout_secs = v; }
        cfg
    }

    /// Command-line flags override whatever is already set.
    pub fn apply_args(mut self, args: &[String]) -> AppResult<Self> {
        if let Some(p) = parse_flag(args, "--http-port")? { self.http_port = p; }
        if let Some(v) = flag_value(args, "--bind") { self.bind = v.to_string(); }
        if let Some(v) = flag_value(args, "--api-base") { self.api_base = v.to_string(); }
        if let Some(v) = flag_value(args, "--jwt-secret") { self.jwt_secret = Some(v.to_string()); }
        if let Some(v) = flag_value(args, "--token-file") { self.token_file = PathBuf::from(v); }
        if let Some(v) = parse_flag(args, "--access-ttl-minutes")? { self.access_ttl_minutes = v; }
        if let Some(v) = parse_flag(args, "--refresh-ttl-days")? { self.refresh_ttl_days = v; }
        if let Some(v) = parse_flag(args, "--storage-poll-ms")? { self.storage_poll_ms = v; }
        if let Some(v) = flag_value(args, "--login-path") { self.login_path = v.to_string(); }
        if let Some(v) = parse_flag(args, "--request-timeout-secs")? { self.request_timeout_secs = v; }
        if has_flag(args, "--no-verify") { self.verify_tokens = Some(false); }
        if has_flag(args, "--verify") { self.verify_tokens = Some(true); }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.login_path.starts_with('/') {
            return Err(AppError::config("bad_login_path", format!("login path '{}' must start with '/'", self.login_path)));
        }
        if self.access_ttl_minutes <= 0 || self.refresh_ttl_days <= 0 {
            return Err(AppError::config("bad_ttl", "token lifetimes must be positive"));
        }
        if self.storage_poll_ms == 0 {
            return Err(AppError::config("bad_poll_interval", "storage poll interval must be positive"));
        }
        if self.verifies_tokens() && self.jwt_secret.is_none() {
            return Err(AppError::config("missing_secret", "token verification requested but no JWT secret is configured"));
        }
        Ok(())
    }

    pub fn verifies_tokens(&self) -> bool {
        self.verify_tokens.unwrap_or(self.jwt_secret.is_some())
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.bind, self.http_port) }

    pub fn storage_poll_interval(&self) -> Duration { Duration::from_millis(self.storage_poll_ms) }

    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

    /// Signature-checking decoder when a secret is configured and verification is on;
    /// otherwise a payload-only decoder that still rejects expired tokens.
    pub fn decoder(&self) -> Arc<dyn TokenDecoder> {
        match (&self.jwt_secret, self.verifies_tokens()) {
            (Some(secret), true) => Arc::new(Hs256Decoder::new(secret)),
            _ => {
                warn!(target: "config", "token signatures are NOT verified; set {}JWT_SECRET to enable", ENV_PREFIX);
                Arc::new(UnverifiedDecoder::default())
            }
        }
    }

    pub fn issuer(&self) -> Option<TokenIssuer> {
        self.jwt_secret.as_deref().map(|s| {
            TokenIssuer::new(s, chrono::Duration::minutes(self.access_ttl_minutes), chrono::Duration::days(self.refresh_ttl_days))
        })
    }
}
