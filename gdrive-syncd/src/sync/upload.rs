use std::path::{Path, PathBuf};

use gdrive_core::FileMetadata;

use super::error::SyncError;
use super::progress::{Monotonic, ProgressSink};
use super::remote::{RemoteEntry, RemoteStore};
use super::transfer::{ChunkProgress, ResumableTransfer};

pub const DEFAULT_RETRY_BUDGET: u32 = 10;

/// One file headed for one remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub metadata: FileMetadata,
    /// Attempts left, including the one about to run.
    pub retries_left: u32,
}

impl UploadTask {
    /// Names the upload after the local file and guesses its MIME type from
    /// the extension.
    pub fn new(local_path: impl Into<PathBuf>, parent_id: impl Into<String>, budget: u32) -> Self {
        let local_path = local_path.into();
        let name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = guess_mime_type(&local_path);
        Self {
            local_path,
            metadata: FileMetadata {
                name,
                mime_type,
                parents: vec![parent_id.into()],
            },
            retries_left: budget.max(1),
        }
    }
}

fn guess_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

enum UploadState {
    Starting,
    SendingChunk(ResumableTransfer),
    Done(RemoteEntry),
    FailedRetryable(SyncError),
    FailedTerminal(SyncError),
}

/// Drives resumable uploads to completion.
///
/// A failed attempt restarts the whole transfer with a new session rather
/// than resuming from the last acknowledged byte, and the next attempt starts
/// immediately without any backoff delay.
pub struct UploadEngine<'a, R> {
    remote: &'a R,
    chunk_size: usize,
}

impl<'a, R: RemoteStore> UploadEngine<'a, R> {
    pub fn new(remote: &'a R, chunk_size: usize) -> Self {
        Self { remote, chunk_size }
    }

    pub async fn upload(
        &self,
        mut task: UploadTask,
        progress: &mut dyn ProgressSink,
    ) -> Result<RemoteEntry, SyncError> {
        let name = task.metadata.name.clone();
        let mut progress = Monotonic::new(progress);
        let mut attempts = 0u32;
        let mut state = UploadState::Starting;
        tracing::info!(file = %task.local_path.display(), "uploading {name}");

        loop {
            state = match state {
                UploadState::Starting => {
                    attempts += 1;
                    match ResumableTransfer::open(
                        self.remote,
                        &task.local_path,
                        &task.metadata,
                        self.chunk_size,
                    )
                    .await
                    {
                        Ok(transfer) => UploadState::SendingChunk(transfer),
                        Err(err) => spend_attempt(&mut task, err),
                    }
                }
                UploadState::SendingChunk(mut transfer) => {
                    match transfer.next_chunk(self.remote).await {
                        Ok(ChunkProgress::Partial(fraction)) => {
                            progress.report(&name, fraction);
                            UploadState::SendingChunk(transfer)
                        }
                        Ok(ChunkProgress::Done(entry)) => UploadState::Done(entry),
                        Err(err) => spend_attempt(&mut task, err),
                    }
                }
                UploadState::FailedRetryable(err) => {
                    tracing::warn!(
                        file = %name,
                        error = %err,
                        transient = err.is_transient(),
                        retries_left = task.retries_left,
                        "upload attempt failed, restarting transfer"
                    );
                    UploadState::Starting
                }
                UploadState::Done(entry) => {
                    progress.complete(&name);
                    tracing::info!(file = %name, id = %entry.id, attempts, "completed upload");
                    return Ok(entry);
                }
                UploadState::FailedTerminal(err) => {
                    return Err(SyncError::RetryBudgetExhausted {
                        attempts,
                        last: Box::new(err),
                    });
                }
            };
        }
    }
}

fn spend_attempt(task: &mut UploadTask, err: SyncError) -> UploadState {
    task.retries_left = task.retries_left.saturating_sub(1);
    if task.retries_left == 0 {
        UploadState::FailedTerminal(err)
    } else {
        UploadState::FailedRetryable(err)
    }
}
