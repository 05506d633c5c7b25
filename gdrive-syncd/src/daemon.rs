use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use gdrive_core::{DEFAULT_BASE_URL, DriveClient, OAuthClient, ROOT_FOLDER_ID};

use crate::oauth_flow::OAuthFlow;
use crate::session::DriveSession;
use crate::storage::{
    ClientSecrets, CredentialStore, DEFAULT_CLIENT_SECRET_FILE, OAuthState, StorageError,
};
use crate::sync::dispatcher::Dispatcher;
use crate::sync::local_watcher::start_notify_watcher;
use crate::sync::paths::DEFAULT_ROOT_MARKER;
use crate::sync::pipeline::DrivePipeline;
use crate::sync::transfer::{DEFAULT_CHUNK_SIZE, aligned_chunk_size};
use crate::sync::upload::DEFAULT_RETRY_BUDGET;

const DEFAULT_WATCH_DIR_NAME: &str = "Media";
const DEFAULT_UPLOAD_CONCURRENCY: u64 = 1;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaemonConfig {
    pub watch_dir: PathBuf,
    pub root_marker: String,
    pub root_folder_id: String,
    pub retry_budget: u32,
    pub chunk_size: usize,
    pub upload_concurrency: usize,
    pub request_timeout: Duration,
    pub credentials_path: PathBuf,
    pub client_secret_file: PathBuf,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        Ok(Self::from_vars(&home, |name| std::env::var(name).ok()))
    }

    fn from_vars(home: &Path, var: impl Fn(&str) -> Option<String>) -> Self {
        let watch_dir = var("GDRIVE_WATCH_DIR")
            .map(|value| expand_with_home(&value, home))
            .unwrap_or_else(|| home.join(DEFAULT_WATCH_DIR_NAME));
        let root_marker = non_empty(var("GDRIVE_ROOT_MARKER"))
            .unwrap_or_else(|| DEFAULT_ROOT_MARKER.to_string());
        let root_folder_id =
            non_empty(var("GDRIVE_ROOT_FOLDER_ID")).unwrap_or_else(|| ROOT_FOLDER_ID.to_string());
        let retry_budget = read_u64(
            var("GDRIVE_UPLOAD_RETRIES"),
            u64::from(DEFAULT_RETRY_BUDGET),
        )
        .min(u64::from(u32::MAX)) as u32;
        let chunk_size = aligned_chunk_size(
            read_u64(var("GDRIVE_CHUNK_SIZE"), DEFAULT_CHUNK_SIZE as u64) as usize,
        );
        let upload_concurrency =
            read_u64(var("GDRIVE_UPLOAD_CONCURRENCY"), DEFAULT_UPLOAD_CONCURRENCY) as usize;
        let request_timeout = Duration::from_secs(read_u64(
            var("GDRIVE_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ));
        let credentials_path = var("GDRIVE_CREDENTIALS_PATH")
            .map(|value| expand_with_home(&value, home))
            .unwrap_or_else(|| CredentialStore::default_path(home));
        let client_secret_file = var("GDRIVE_CLIENT_SECRET_FILE")
            .map(|value| expand_with_home(&value, home))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_SECRET_FILE));

        Self {
            watch_dir,
            root_marker,
            root_folder_id,
            retry_budget,
            chunk_size,
            upload_concurrency,
            request_timeout,
            credentials_path,
            client_secret_file,
        }
    }
}

pub struct DaemonRuntime {
    config: DaemonConfig,
    session: DriveSession,
}

impl DaemonRuntime {
    pub async fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.watch_dir)
            .await
            .with_context(|| format!("failed to create watch dir at {:?}", config.watch_dir))?;
        if !has_marker_component(&config.watch_dir, &config.root_marker) {
            tracing::warn!(
                watch_dir = %config.watch_dir.display(),
                marker = %config.root_marker,
                "watch dir does not contain the root marker; every file will be rejected"
            );
        }

        let session = resolve_session(&config).await?;
        let about = session
            .validate()
            .await
            .context("failed to validate Google Drive session")?;
        tracing::info!(
            user = about.user.email_address.as_deref().unwrap_or("unknown"),
            "connected to Google Drive"
        );

        Ok(Self { config, session })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let (watcher, events) = start_notify_watcher(&self.config.watch_dir)
            .with_context(|| format!("failed to watch {:?}", self.config.watch_dir))?;
        tracing::info!(
            watch_dir = %self.config.watch_dir.display(),
            root_marker = %self.config.root_marker,
            root_folder = %self.config.root_folder_id,
            chunk_size = self.config.chunk_size,
            retries = self.config.retry_budget,
            concurrency = self.config.upload_concurrency,
            "started"
        );

        let pipeline = DrivePipeline::new(
            self.session,
            self.config.root_folder_id.clone(),
            self.config.retry_budget,
            self.config.chunk_size,
        );
        let dispatcher = Dispatcher::new(
            pipeline,
            self.config.root_marker.clone(),
            self.config.upload_concurrency,
        );
        let mut dispatch_handle = tokio::spawn(async move { dispatcher.run(events).await });

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed waiting for shutdown signal")?;
                tracing::info!("shutdown requested");
            }
            _ = &mut dispatch_handle => {
                tracing::warn!("filesystem event stream ended");
            }
        }

        dispatch_handle.abort();
        drop(watcher);
        Ok(())
    }
}

include!("daemon_helpers.rs");

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
