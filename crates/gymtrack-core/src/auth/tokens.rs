use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Access token plus the optional refresh token issued with it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Credential to present to the refresh endpoint. Backends that never
    /// issued a refresh token accept the access token itself.
    pub fn refresh_credential(&self) -> &str {
        self.refresh_token.as_deref().unwrap_or(&self.access_token)
    }

    /// Replace the access token, keeping the old refresh token unless a new one was issued.
    pub fn rotated(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
        }
    }
}

// Tokens never end up in logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Everything the token store persists, written as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub tokens: TokenPair,
    pub user: User,
    pub saved_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(tokens: TokenPair, user: User) -> Self {
        Self {
            tokens,
            user,
            saved_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.saved_at).num_minutes().max(0)
    }
}
