use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::no_token("no_token", "missing").http_status(), 401);
    assert_eq!(AppError::invalid_token("invalid_token", "bad").http_status(), 401);
    assert_eq!(AppError::unauthorized("forbidden", "no").http_status(), 403);
    assert_eq!(AppError::exchange("login_failed", "down").http_status(), 502);
    assert_eq!(AppError::config("config", "bad").http_status(), 500);
    assert_eq!(AppError::io("io", "io").http_status(), 503);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn access_denials_are_the_guard_resolved_kinds() {
    assert!(AppError::no_token("a", "b").is_access_denial());
    assert!(AppError::invalid_token("a", "b").is_access_denial());
    assert!(AppError::unauthorized("a", "b").is_access_denial());
    assert!(!AppError::exchange("a", "b").is_access_denial());
    assert!(!AppError::io("a", "b").is_access_denial());
}

#[test]
fn anyhow_roundtrip_keeps_app_error() {
    let original = AppError::exchange("login_failed", "Invalid password");
    let wrapped: anyhow::Error = original.clone().into();
    assert_eq!(AppError::from(wrapped), original);

    let plain = AppError::from(anyhow::anyhow!("boom"));
    assert_eq!(plain.code_str(), "internal_error");
    assert_eq!(plain.message(), "boom");
}

#[test]
fn serializes_with_type_tag() {
    let v = serde_json::to_value(AppError::unauthorized("forbidden", "nope")).unwrap();
    assert_eq!(v["type"], "unauthorized");
    assert_eq!(v["code"], "forbidden");
    assert_eq!(v["message"], "nope");
}
