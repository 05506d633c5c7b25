async fn resolve_session(config: &DaemonConfig) -> anyhow::Result<DriveSession> {
    let client = DriveClient::with_options(DEFAULT_BASE_URL, "", Some(config.request_timeout))
        .context("failed to build Drive client")?;
    if let Ok(token) = std::env::var("GDRIVE_TOKEN") {
        tracing::info!("using access token from GDRIVE_TOKEN");
        return Ok(DriveSession::with_static_token(client, token));
    }

    let store = CredentialStore::new(&config.credentials_path);
    let oauth_client = oauth_client_from_config(config);
    let state = match store.load() {
        Ok(state) => state,
        Err(StorageError::TokenNotFound) => {
            let oauth_client = match &oauth_client {
                Ok(client) => client.clone(),
                Err(err) => anyhow::bail!("cannot authorize without an OAuth client: {err:#}"),
            };
            authenticate_and_store(oauth_client, &store).await?
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to load credentials from {:?}", store.path())
            });
        }
    };
    let oauth_client = match oauth_client {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(error = %err, "no OAuth client configured; tokens cannot be refreshed");
            None
        }
    };
    Ok(DriveSession::with_grant(client, state, oauth_client, Some(store)))
}

async fn authenticate_and_store(
    oauth_client: OAuthClient,
    store: &CredentialStore,
) -> anyhow::Result<OAuthState> {
    let flow = OAuthFlow::new(oauth_client);
    let token = flow.authenticate().await?;
    let state = OAuthState::from_oauth_token(&token);
    store.save(&state).context("failed to save token")?;
    tracing::info!(path = %store.path().display(), "stored credentials");
    Ok(state)
}

fn oauth_client_from_config(config: &DaemonConfig) -> anyhow::Result<OAuthClient> {
    let secrets = ClientSecrets::resolve(&config.client_secret_file)?;
    OAuthClient::new(secrets.client_id, secrets.client_secret).context("invalid oauth config")
}

fn has_marker_component(path: &Path, marker: &str) -> bool {
    path.components()
        .any(|component| component.as_os_str() == marker)
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn read_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
