use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::claims::{Claims, Hs256Decoder, TokenDecoder, TokenError};
use super::principal::Principal;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Token response body, same shape the clinic API returns from `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

/// Mints HS256 access/refresh tokens. Used by the gate's refresh endpoint and by
/// the CLI for local development tokens.
pub struct TokenIssuer {
    key: EncodingKey,
    decoder: Hs256Decoder,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            decoder: Hs256Decoder::new(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign(&self, principal: &Principal, token_type: &str, ttl: Duration) -> Result<String, TokenError> {
        let claims = Claims {
            sub: principal.subject.clone(),
            id: principal.user_id,
            email: principal.email.clone(),
            role: Some(principal.role.clone()),
            exp: Some((Utc::now() + ttl).timestamp()),
            token_type: Some(token_type.to_string()),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_access(&self, principal: &Principal) -> Result<String, TokenError> {
        self.sign(principal, ACCESS_TOKEN_TYPE, self.access_ttl)
    }

    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(principal)?,
            refresh_token: Some(self.sign(principal, REFRESH_TOKEN_TYPE, self.refresh_ttl)?),
            token_type: "bearer".into(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Check a token against this issuer's secret and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.decoder.decode(token)
    }

    /// Exchange a still-valid refresh token for a fresh pair carrying the same identity.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.verify(refresh_token)?;
        if claims.token_type.as_deref() != Some(REFRESH_TOKEN_TYPE) {
            return Err(TokenError::Rejected("not a refresh token".into()));
        }
        let principal = Principal::from_claims(&claims)
            .ok_or_else(|| TokenError::Rejected("refresh token carries no role".into()))?;
        self.issue_pair(&principal)
    }
}
