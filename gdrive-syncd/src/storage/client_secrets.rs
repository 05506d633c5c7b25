use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CLIENT_SECRET_FILE: &str = ".google-api-keys.json";

#[derive(Debug, Error)]
pub enum ClientSecretsError {
    #[error("failed to read client secret file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("client secret file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("client secret file has neither an 'installed' nor a 'web' section")]
    MissingSection,
    #[error("no OAuth client configured: set GDRIVE_CLIENT_ID and GDRIVE_CLIENT_SECRET or provide {0}")]
    NotConfigured(String),
}

/// The OAuth client registration the daemon authorizes as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct SecretFile {
    installed: Option<SecretSection>,
    web: Option<SecretSection>,
}

#[derive(Deserialize)]
struct SecretSection {
    client_id: String,
    client_secret: String,
}

impl ClientSecrets {
    /// Parses the JSON downloaded from the Google Cloud console.
    pub fn from_json(raw: &str) -> Result<Self, ClientSecretsError> {
        let file: SecretFile = serde_json::from_str(raw)?;
        let section = file
            .installed
            .or(file.web)
            .ok_or(ClientSecretsError::MissingSection)?;
        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ClientSecretsError> {
        let raw = fs::read_to_string(path).map_err(|source| ClientSecretsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// `GDRIVE_CLIENT_ID`/`GDRIVE_CLIENT_SECRET` win over the file; the file
    /// is only consulted when either is unset.
    pub fn resolve(path: &Path) -> Result<Self, ClientSecretsError> {
        let env_id = std::env::var("GDRIVE_CLIENT_ID").ok();
        let env_secret = std::env::var("GDRIVE_CLIENT_SECRET").ok();
        Self::merge(env_id, env_secret, path)
    }

    fn merge(
        env_id: Option<String>,
        env_secret: Option<String>,
        path: &Path,
    ) -> Result<Self, ClientSecretsError> {
        if let (Some(client_id), Some(client_secret)) = (env_id.clone(), env_secret.clone()) {
            return Ok(Self {
                client_id,
                client_secret,
            });
        }
        if !path.exists() {
            return Err(ClientSecretsError::NotConfigured(
                path.display().to_string(),
            ));
        }
        let file = Self::from_file(path)?;
        Ok(Self {
            client_id: env_id.unwrap_or(file.client_id),
            client_secret: env_secret.unwrap_or(file.client_secret),
        })
    }
}
