use anyhow::Context;
use gdrive_core::{About, ApiErrorClass, DriveClient, OAuthClient};
use tokio::sync::Mutex;

use crate::storage::{CredentialStore, OAuthState};
use crate::sync::error::SyncError;
use crate::sync::remote::RemoteSource;

/// Tokens are renewed this long before Google would reject them.
const EXPIRY_MARGIN_SECS: i64 = 60;

enum SessionAuth {
    /// `GDRIVE_TOKEN`: used as-is, never refreshed or persisted.
    Static(String),
    Grant {
        state: Mutex<OAuthState>,
        oauth: Option<OAuthClient>,
        store: Option<CredentialStore>,
    },
}

/// An authorized Drive session, handing each pipeline run a client that
/// carries a currently valid access token.
pub struct DriveSession {
    client: DriveClient,
    auth: SessionAuth,
}

impl DriveSession {
    pub fn with_static_token(client: DriveClient, token: impl Into<String>) -> Self {
        Self {
            client,
            auth: SessionAuth::Static(token.into()),
        }
    }

    /// A session over a stored OAuth grant. Without `oauth` the grant is used
    /// until it expires; renewed grants are written back to `store`.
    pub fn with_grant(
        client: DriveClient,
        state: OAuthState,
        oauth: Option<OAuthClient>,
        store: Option<CredentialStore>,
    ) -> Self {
        Self {
            client,
            auth: SessionAuth::Grant {
                state: Mutex::new(state),
                oauth,
                store,
            },
        }
    }

    pub async fn authorized_client(&self) -> Result<DriveClient, SyncError> {
        let token = match &self.auth {
            SessionAuth::Static(token) => token.clone(),
            SessionAuth::Grant {
                state,
                oauth,
                store,
            } => {
                let mut state = state.lock().await;
                if state.expires_within(EXPIRY_MARGIN_SECS) {
                    renew(&mut state, oauth.as_ref(), store.as_ref()).await?;
                }
                state.access_token.clone()
            }
        };
        Ok(self.client.with_token(token))
    }

    /// Forces a refresh regardless of the recorded expiry.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let SessionAuth::Grant {
            state,
            oauth,
            store,
        } = &self.auth
        else {
            return Err(SyncError::Session(
                "static access token cannot be refreshed".into(),
            ));
        };
        let mut state = state.lock().await;
        renew(&mut state, oauth.as_ref(), store.as_ref()).await
    }

    /// Checks the session against the account endpoint, refreshing once if
    /// the token is rejected.
    pub async fn validate(&self) -> anyhow::Result<About> {
        let client = self.authorized_client().await?;
        match client.about().await {
            Ok(about) => Ok(about),
            Err(err) if matches!(err.classification(), Some(ApiErrorClass::Auth)) => {
                self.refresh()
                    .await
                    .context("failed to refresh token after 401")?;
                let client = self.authorized_client().await?;
                Ok(client.about().await?)
            }
            Err(err) => Err(err.into()),
        }
    }
}

async fn renew(
    state: &mut OAuthState,
    oauth: Option<&OAuthClient>,
    store: Option<&CredentialStore>,
) -> Result<(), SyncError> {
    let refresh_token = state
        .refresh_token
        .as_deref()
        .ok_or_else(|| SyncError::Session("grant has no refresh token".into()))?;
    let oauth = oauth.ok_or_else(|| {
        SyncError::Session("no OAuth client configured to refresh the grant".into())
    })?;
    let token = oauth
        .refresh_token(refresh_token)
        .await
        .map_err(|err| SyncError::Session(format!("token refresh failed: {err}")))?;
    tracing::debug!(expires_in = ?token.expires_in, "refreshed access token");
    *state = state.renewed_by(&token);
    persist(store, state);
    Ok(())
}

fn persist(store: Option<&CredentialStore>, state: &OAuthState) {
    let Some(store) = store else {
        return;
    };
    if let Err(err) = store.save(state) {
        tracing::warn!(
            path = %store.path().display(),
            error = %err,
            "failed to persist refreshed credentials"
        );
    }
}

impl RemoteSource for DriveSession {
    type Remote = DriveClient;

    async fn acquire(&self) -> Result<DriveClient, SyncError> {
        self.authorized_client().await
    }

    async fn on_auth_failure(&self) {
        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "session refresh failed");
        }
    }
}
