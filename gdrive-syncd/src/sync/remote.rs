use std::future::Future;

use gdrive_core::{ChunkResponse, DriveClient, DriveError, DriveFile, FileMetadata, UploadSession};

use super::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// A remote entry as far as syncing is concerned. Names are not unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    pub parent: Option<String>,
}

impl From<DriveFile> for RemoteEntry {
    fn from(file: DriveFile) -> Self {
        let kind = if file.is_folder() {
            EntryKind::Folder
        } else {
            EntryKind::File
        };
        Self {
            id: file.id,
            name: file.name,
            kind,
            parent: file.parents.into_iter().next(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Partial { received: u64 },
    Complete(RemoteEntry),
}

impl From<ChunkResponse> for ChunkOutcome {
    fn from(response: ChunkResponse) -> Self {
        match response {
            ChunkResponse::Incomplete { received } => ChunkOutcome::Partial { received },
            ChunkResponse::Complete(file) => ChunkOutcome::Complete(file.into()),
        }
    }
}

/// What the sync core needs from remote storage.
pub trait RemoteStore: Send + Sync {
    fn list_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<RemoteEntry>, DriveError>> + Send;

    fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
    ) -> impl Future<Output = Result<RemoteEntry, DriveError>> + Send;

    fn create_resumable_upload(
        &self,
        metadata: &FileMetadata,
        total_size: u64,
    ) -> impl Future<Output = Result<UploadSession, DriveError>> + Send;

    fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Vec<u8>,
    ) -> impl Future<Output = Result<ChunkOutcome, DriveError>> + Send;
}

impl RemoteStore for DriveClient {
    async fn list_by_name(&self, name: &str) -> Result<Vec<RemoteEntry>, DriveError> {
        let files = DriveClient::list_by_name(self, name).await?;
        Ok(files.into_iter().map(RemoteEntry::from).collect())
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteEntry, DriveError> {
        Ok(DriveClient::create_folder(self, name, parent_id)
            .await?
            .into())
    }

    async fn create_resumable_upload(
        &self,
        metadata: &FileMetadata,
        total_size: u64,
    ) -> Result<UploadSession, DriveError> {
        self.start_resumable_upload(metadata, total_size).await
    }

    async fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkOutcome, DriveError> {
        Ok(self.upload_chunk(session, offset, chunk).await?.into())
    }
}

/// Hands out an authorized [`RemoteStore`] for each pipeline run.
pub trait RemoteSource: Send + Sync + 'static {
    type Remote: RemoteStore;

    fn acquire(&self) -> impl Future<Output = Result<Self::Remote, SyncError>> + Send;

    /// Called after a run failed with an authorization error.
    fn on_auth_failure(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
