//!
//! clinic-gate HTTP server
//! -----------------------
//! Axum front for the route guard. Every screen request is evaluated against the
//! clinic routing table using the bearer token the caller presents (header or
//! cookie); denials become `303 See Other` redirects that carry the same
//! `from`/`error` state a client-side guard would hand to its router.
//!
//! Responsibilities:
//! - Guarded screen resolution for any `GET` path not claimed by the API.
//! - JSON decision endpoint and routing-table listing for client shells.
//! - Token verification and refresh, mirroring the clinic API's `/auth` surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Json, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::{AppError, AppResult};
use crate::guard::{Decision, RouteGuard};
use crate::identity::{Principal, TokenDecoder, TokenIssuer, TokenPair};
use crate::routes::clinic_routes;
use crate::session::{Session, TOKEN_KEY};

/// Shared state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<RouteGuard>,
    pub decoder: Arc<dyn TokenDecoder>,
    /// Present only when a signing secret is configured.
    pub issuer: Option<Arc<TokenIssuer>>,
}

impl AppState {
    pub fn new(guard: RouteGuard, decoder: Arc<dyn TokenDecoder>, issuer: Option<TokenIssuer>) -> Self {
        Self { guard: Arc::new(guard), decoder, issuer: issuer.map(Arc::new) }
    }

    pub fn from_config(config: &GateConfig) -> AppResult<Self> {
        let guard = RouteGuard::new(clinic_routes()?).with_login_path(config.login_path.clone());
        Ok(Self::new(guard, config.decoder(), config.issuer()))
    }

    fn session_for(&self, token: Option<&str>) -> Session {
        Session::from_bearer(token, self.decoder.as_ref())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({"detail": self.message(), "code": self.code_str()}))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/routes", get(list_routes))
        .route("/api/access/decide", post(decide_access))
        .route("/auth/verify-token", post(verify_token))
        .route("/auth/refresh", post(refresh))
        .fallback(screen)
        .with_state(state)
}

/// Start the gate on the configured address and serve until the process exits.
pub async fn run(config: GateConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).context("while building the routing table")?;
    info!(
        target: "gate",
        "clinic-gate starting: bind={}, login_path={}, routes={}, verify_tokens={}, refresh={}",
        config.bind_addr(),
        config.login_path,
        state.guard.table().len(),
        config.verifies_tokens(),
        state.issuer.is_some()
    );
    let addr: SocketAddr = config.bind_addr().parse().with_context(|| format!("invalid bind address '{}'", config.bind_addr()))?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {}", addr))?;
    info!(target: "gate", "listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        if let Some((k, v)) = part.trim().split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

/// Bearer token from `Authorization`, falling back to the `access_token` cookie.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, rest) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| rest.trim().to_string())
        })
        .filter(|t| !t.is_empty());
    from_header.or_else(|| parse_cookie(headers, TOKEN_KEY).filter(|t| !t.is_empty()))
}

fn not_found(path: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": format!("no screen at {}", path)}))).into_response()
}

async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "login_path": state.guard.login_path(),
        "routes": state.guard.table().rules(),
    }))
}

#[derive(Debug, Deserialize)]
struct DecidePayload {
    path: String,
    #[serde(default)]
    token: Option<String>,
}

async fn decide_access(State(state): State<AppState>, Json(payload): Json<DecidePayload>) -> Response {
    let session = state.session_for(payload.token.as_deref());
    match state.guard.check(&payload.path, &session) {
        Some(outcome) => Json(outcome).into_response(),
        None => not_found(&payload.path),
    }
}

#[derive(Debug, Deserialize)]
struct VerifyPayload {
    token: String,
}

#[derive(Debug, Default, Serialize)]
struct VerifyResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// Signature-checked verification. Without a signing secret there is nothing to
/// check against, so the endpoint refuses instead of trusting the payload.
async fn verify_token(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPayload>,
) -> AppResult<Json<VerifyResponse>> {
    let Some(issuer) = state.issuer.as_ref() else {
        warn!(target: "gate", "verify-token called without a signing secret");
        return Err(AppError::config("verify_disabled", "token verification requires a configured signing secret"));
    };
    let principal = match issuer.verify(payload.token.trim()) {
        Ok(claims) => Principal::from_claims(&claims),
        Err(e) => {
            debug!(target: "gate", "verify-token: {}", e);
            None
        }
    };
    Ok(Json(match principal {
        Some(p) => VerifyResponse { valid: true, user_id: p.user_id, email: p.email, role: Some(p.role) },
        None => VerifyResponse::default(),
    }))
}

#[derive(Debug, Deserialize)]
struct RefreshPayload {
    refresh_token: String,
}

async fn refresh(State(state): State<AppState>, Json(payload): Json<RefreshPayload>) -> AppResult<Json<TokenPair>> {
    let Some(issuer) = state.issuer.as_ref() else {
        return Err(AppError::config("refresh_disabled", "token refresh requires a configured signing secret"));
    };
    match issuer.refresh(payload.refresh_token.trim()) {
        Ok(pair) => Ok(Json(pair)),
        Err(e) => {
            info!(target: "gate", "refresh rejected: {}", e);
            Err(AppError::invalid_token("invalid_refresh_token", "Invalid refresh token"))
        }
    }
}

/// Guarded screen resolution for every path the API does not claim.
async fn screen(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let path = uri.path();
    let token = bearer_token(&headers);
    let session = state.session_for(token.as_deref());
    let Some(outcome) = state.guard.check(path, &session) else {
        return not_found(path);
    };
    if let Some(nav) = &outcome.navigation {
        let location = nav.location();
        if matches!(outcome.decision, Decision::RedirectToLoginWithError(_)) {
            warn!(target: "gate", "path={} presented a token without a usable role", path);
        }
        info!(target: "gate", "path={} route={} -> {}", path, outcome.route, location);
        return Redirect::to(&location).into_response();
    }
    match outcome.decision {
        Decision::Render => Json(json!({
            "screen": outcome.route,
            "path": path,
            "role": session.role(),
        }))
        .into_response(),
        // A bearer-derived session is never loading; answer like a client placeholder would.
        _ => (StatusCode::ACCEPTED, Json(json!({"screen": "loading", "path": path}))).into_response(),
    }
}
