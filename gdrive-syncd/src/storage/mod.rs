mod client_secrets;
mod credential_store;

pub use client_secrets::{ClientSecrets, ClientSecretsError, DEFAULT_CLIENT_SECRET_FILE};
pub use credential_store::{CredentialStore, StorageError};

use gdrive_core::OAuthToken;
use serde::{Deserialize, Serialize};

/// Persisted OAuth grant. `expires_at` is a Unix timestamp in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl OAuthState {
    pub fn from_oauth_token(token: &OAuthToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|secs| now_unix().saturating_add(secs as i64)),
            scope: token.scope.clone(),
            token_type: Some(token.token_type.clone()),
        }
    }

    /// The grant after a refresh. Google answers a refresh without the
    /// refresh token and sometimes without the scope, so those carry over.
    pub fn renewed_by(&self, token: &OAuthToken) -> Self {
        let fresh = Self::from_oauth_token(token);
        Self {
            refresh_token: fresh.refresh_token.or_else(|| self.refresh_token.clone()),
            scope: fresh.scope.or_else(|| self.scope.clone()),
            ..fresh
        }
    }

    /// True once the token is within `margin_secs` of its expiry. A grant
    /// without an expiry never goes stale on its own.
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now_unix().saturating_add(margin_secs))
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
