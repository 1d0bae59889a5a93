use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::claims::Claims;
use super::role::normalize;

/// The authenticated subject behind a session. `role` is always canonical.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// Derive a principal from decoded claims. Returns `None` when the claims carry
    /// no usable role, which callers treat the same as an undecodable token.
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let role = normalize(claims.role.as_deref());
        if role.is_empty() { return None; }
        Some(Self {
            subject: claims.sub.clone(),
            user_id: claims.id.or_else(|| claims.sub.as_deref().and_then(|s| s.parse().ok())),
            email: claims.email.clone(),
            role,
            expires_at: claims.exp.and_then(|e| Utc.timestamp_opt(e, 0).single()),
        })
    }

    pub fn display_name(&self) -> &str {
        self.email.as_deref().or(self.subject.as_deref()).unwrap_or("<anonymous>")
    }
}
