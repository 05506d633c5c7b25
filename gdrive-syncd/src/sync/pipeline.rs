use super::dispatcher::{UploadJob, UploadPipeline};
use super::error::SyncError;
use super::index::RemoteIndex;
use super::locks::FolderLocks;
use super::materialize::DirectoryMaterializer;
use super::progress::LogProgress;
use super::reconcile::reconcile;
use super::remote::{RemoteEntry, RemoteSource};
use super::upload::{UploadEngine, UploadTask};

/// The full path from a local file to a remote entry, against whatever
/// remote the source hands out for the run.
pub struct DrivePipeline<S> {
    source: S,
    root_id: String,
    retry_budget: u32,
    chunk_size: usize,
    locks: FolderLocks,
}

impl<S: RemoteSource> DrivePipeline<S> {
    pub fn new(source: S, root_id: impl Into<String>, retry_budget: u32, chunk_size: usize) -> Self {
        Self {
            source,
            root_id: root_id.into(),
            retry_budget,
            chunk_size,
            locks: FolderLocks::new(),
        }
    }

    async fn sync(&self, job: UploadJob) -> Result<RemoteEntry, SyncError> {
        let remote = self.source.acquire().await?;
        let directories = &job.segments.directories;

        let parent_id = {
            let _guard = self.locks.lock(directories).await;
            let boundary = reconcile(&RemoteIndex::new(&remote), directories).await?;
            tracing::debug!(
                anchor = ?boundary.last_synced,
                missing = boundary.unsynced.len(),
                "reconciled remote path"
            );
            DirectoryMaterializer::new(&remote, &self.root_id)
                .materialize(&boundary.last_synced, &boundary.unsynced)
                .await?
        };

        let task = UploadTask::new(job.local_path, parent_id, self.retry_budget);
        let mut progress = LogProgress::new();
        UploadEngine::new(&remote, self.chunk_size)
            .upload(task, &mut progress)
            .await
    }
}

impl<S: RemoteSource> UploadPipeline for DrivePipeline<S> {
    async fn run(&self, job: UploadJob) -> Result<RemoteEntry, SyncError> {
        let result = self.sync(job).await;
        if let Err(err) = &result
            && err.is_auth()
        {
            tracing::warn!(error = %err, "authorization rejected, refreshing session");
            self.source.on_auth_failure().await;
        }
        result
    }
}
