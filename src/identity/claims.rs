use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT payload as issued by the clinic API. Only `role` is required for routing;
/// the rest is carried for display and refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn is_expired_at(&self, now_secs: i64, leeway_secs: i64) -> bool {
        match self.exp {
            Some(exp) => exp + leeway_secs < now_secs,
            None => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,
    #[error("token must have three dot-separated segments, found {0}")]
    Malformed(usize),
    #[error("token payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not a JSON claims object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token has expired")]
    Expired,
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Empty => "token_empty",
            TokenError::Malformed(_) => "token_malformed",
            TokenError::Base64(_) | TokenError::Json(_) => "token_undecodable",
            TokenError::Expired => "token_expired",
            TokenError::Rejected(_) => "token_rejected",
            TokenError::Signing(_) => "token_signing",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Rejected(err.to_string()),
        }
    }
}

/// Turns an opaque bearer token into claims. Decode failures are errors, never a
/// partially filled payload.
pub trait TokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<Claims, TokenError>;
}

/// Reads the payload segment without checking the signature, the way a browser
/// client inspects its own token. Expiry is still enforced unless disabled.
#[derive(Debug, Clone)]
pub struct UnverifiedDecoder {
    pub check_expiry: bool,
    pub leeway_secs: i64,
}

impl Default for UnverifiedDecoder {
    fn default() -> Self { Self { check_expiry: true, leeway_secs: 30 } }
}

impl UnverifiedDecoder {
    pub fn ignoring_expiry() -> Self { Self { check_expiry: false, ..Default::default() } }
}

impl TokenDecoder for UnverifiedDecoder {
    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() { return Err(TokenError::Empty); }
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 { return Err(TokenError::Malformed(segments.len())); }
        // Some encoders leave '=' padding on; the URL-safe engine wants it stripped
        let payload = segments[1].trim_end_matches('=');
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload)?;
        let claims: Claims = serde_json::from_slice(&bytes)?;
        if self.check_expiry && claims.is_expired_at(Utc::now().timestamp(), self.leeway_secs) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Verifies HS256 signatures with a shared secret before trusting the payload.
#[derive(Clone)]
pub struct Hs256Decoder {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Decoder {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The clinic API never sets aud; exp is optional on legacy tokens
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 30;
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }
}

impl TokenDecoder for Hs256Decoder {
    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() { return Err(TokenError::Empty); }
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}
