//! HTTP gate integration tests: a real listener on an ephemeral port, driven with
//! reqwest with redirects disabled so the guard's 303s can be inspected.

use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use reqwest::{header, redirect, Client, StatusCode};
use serde_json::{json, Value};

use clinic_gate::config::GateConfig;
use clinic_gate::guard::RouteGuard;
use clinic_gate::identity::{Hs256Decoder, Principal, TokenIssuer, TokenPair};
use clinic_gate::routes::clinic_routes;
use clinic_gate::server::{router, AppState};

const SECRET: &str = "gate-secret";

fn issuer() -> TokenIssuer {
    TokenIssuer::new(SECRET, chrono::Duration::minutes(60), chrono::Duration::days(7))
}

fn principal(role: &str) -> Principal {
    Principal {
        subject: Some("7".into()),
        user_id: Some(7),
        email: Some(format!("{}@clinic.test", role)),
        role: role.into(),
        ..Default::default()
    }
}

fn token(role: &str) -> String {
    issuer().issue_access(&principal(role)).unwrap()
}

async fn spawn_gate() -> Result<(String, Client)> {
    let state = AppState::new(RouteGuard::new(clinic_routes()?), Arc::new(Hs256Decoder::new(SECRET)), Some(issuer()));
    serve(state).await
}

async fn serve(state: AppState) -> Result<(String, Client)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    let client = Client::builder().redirect(redirect::Policy::none()).build()?;
    Ok((format!("http://{}", addr), client))
}

/// Well-formed but unsigned token claiming an arbitrary identity.
fn forged(role: &str) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.forged",
        enc.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        enc.encode(json!({"role": role, "id": 1}).to_string())
    )
}

fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn health_and_routes() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client.get(format!("{}/healthz", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await?, "ok");

    let v: Value = client.get(format!("{}/api/routes", base)).send().await?.json().await?;
    assert_eq!(v["login_path"], "/login");
    let routes = v["routes"].as_array().cloned().unwrap_or_default();
    assert!(routes.iter().any(|r| r["pattern"] == "/super-admin/*" && r["access"]["roles"] == json!(["super_admin"])));
    Ok(())
}

#[tokio::test]
async fn anonymous_navigation_redirects_to_login() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client.get(format!("{}/doctor/schedule", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?from=%2Fdoctor%2Fschedule");

    let resp = client.get(format!("{}/login", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn allowed_role_renders_screen() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client.get(format!("{}/doctor/schedule", base)).bearer_auth(token("doctor")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Value = resp.json().await?;
    assert_eq!(v["screen"], "doctor_dashboard");
    assert_eq!(v["role"], "doctor");
    assert_eq!(v["path"], "/doctor/schedule");
    Ok(())
}

#[tokio::test]
async fn cookie_token_is_accepted() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client
        .get(format!("{}/pharmacy/cart", base))
        .header(header::COOKIE, format!("access_token={}", token("patient")))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn wrong_role_goes_home_with_message() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client.get(format!("{}/super-admin", base)).bearer_auth(token("patient")).send().await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/patient?error=You%20do%20not%20have%20permission%20to%20view%20this%20page");
    Ok(())
}

#[tokio::test]
async fn undecodable_token_reports_invalid_role() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client.get(format!("{}/profile", base)).bearer_auth("not-a-jwt").send().await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?from=%2Fprofile&error=invalid%20role");
    Ok(())
}

#[tokio::test]
async fn unknown_screen_is_404() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let resp = client.get(format!("{}/nowhere/at/all", base)).bearer_auth(token("doctor")).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn decide_endpoint() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let url = format!("{}/api/access/decide", base);

    let v: Value = client.post(&url).json(&json!({"path": "/pharmacy/cart", "token": token("patient")})).send().await?.json().await?;
    assert_eq!(v["route"], "cart");
    assert_eq!(v["decision"], json!({"decision": "render"}));

    let v: Value = client.post(&url).json(&json!({"path": "/lab-results/3", "token": token("nurse")})).send().await?.json().await?;
    assert_eq!(v["decision"], json!({"decision": "redirect_to_role_home", "detail": "/nurse"}));
    assert_eq!(v["navigation"]["path"], "/nurse");

    let v: Value = client.post(&url).json(&json!({"path": "/appointments"})).send().await?.json().await?;
    assert_eq!(v["decision"], json!({"decision": "redirect_to_login"}));
    assert_eq!(v["navigation"]["state"]["from"], "/appointments");

    let resp = client.post(&url).json(&json!({"path": "/nowhere"})).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn verify_token_endpoint() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let url = format!("{}/auth/verify-token", base);
    let v: Value = client.post(&url).json(&json!({"token": token("Lab Technician")})).send().await?.json().await?;
    assert_eq!(v, json!({"valid": true, "user_id": 7, "email": "Lab Technician@clinic.test", "role": "lab_technician"}));

    let v: Value = client.post(&url).json(&json!({"token": "x.y.z"})).send().await?.json().await?;
    assert_eq!(v, json!({"valid": false}));
    Ok(())
}

#[tokio::test]
async fn verify_token_refuses_without_signing_secret() -> Result<()> {
    let (base, client) = serve(AppState::from_config(&GateConfig::default())?).await?;
    let resp = client.post(format!("{}/auth/verify-token", base)).json(&json!({"token": forged("super_admin")})).send().await?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let v: Value = resp.json().await?;
    assert_eq!(v["code"], "verify_disabled");
    assert!(v.get("valid").is_none());
    Ok(())
}

#[tokio::test]
async fn verify_token_checks_signature_even_when_screens_skip_it() -> Result<()> {
    let config = GateConfig { jwt_secret: Some(SECRET.into()), verify_tokens: Some(false), ..GateConfig::default() };
    let (base, client) = serve(AppState::from_config(&config)?).await?;
    let url = format!("{}/auth/verify-token", base);
    let v: Value = client.post(&url).json(&json!({"token": forged("super_admin")})).send().await?.json().await?;
    assert_eq!(v, json!({"valid": false}));

    let v: Value = client.post(&url).json(&json!({"token": token("doctor")})).send().await?.json().await?;
    assert_eq!(v["valid"], true);
    assert_eq!(v["role"], "doctor");
    Ok(())
}

#[tokio::test]
async fn decide_resolves_parent_segments_before_matching() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let url = format!("{}/api/access/decide", base);
    let v: Value = client
        .post(&url)
        .json(&json!({"path": "/patient/../super-admin", "token": token("patient")}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(v["route"], "super_admin_dashboard");
    assert_eq!(v["decision"], json!({"decision": "redirect_to_role_home", "detail": "/patient"}));
    Ok(())
}

#[tokio::test]
async fn refresh_endpoint() -> Result<()> {
    let (base, client) = spawn_gate().await?;
    let url = format!("{}/auth/refresh", base);
    let pair = issuer().issue_pair(&principal("receptionist"))?;

    let resp = client.post(&url).json(&json!({"refresh_token": pair.refresh_token})).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let renewed: TokenPair = resp.json().await?;
    assert_eq!(renewed.token_type, "bearer");
    assert_eq!(renewed.expires_in, 3600);
    let resp = client.get(format!("{}/receptionist", base)).bearer_auth(&renewed.access_token).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post(&url).json(&json!({"refresh_token": pair.access_token})).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let v: Value = resp.json().await?;
    assert_eq!(v["detail"], "Invalid refresh token");
    Ok(())
}
