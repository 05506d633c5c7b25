use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

use super::OAuthState;

const CREDENTIALS_DIR: &str = ".credentials";
const CREDENTIALS_FILENAME: &str = "drive-rust-sync.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token not found")]
    TokenNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("credential file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// OAuth state kept as JSON in a single owner-only file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<home>/.credentials/drive-rust-sync.json`
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILENAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<OAuthState, StorageError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::TokenNotFound);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn save(&self, state: &OAuthState) -> Result<(), StorageError> {
        ensure_parent(&self.path)?;
        let payload = serde_json::to_vec_pretty(state)?;

        let mut options = OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        set_owner_only(&self.path)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

// `mode` only applies when the file is created.
#[cfg(unix)]
fn set_owner_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> io::Result<()> {
    Ok(())
}
