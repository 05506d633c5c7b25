use std::io::{self, SeekFrom};
use std::path::Path;

use gdrive_core::{FileMetadata, UploadSession};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::SyncError;
use super::remote::{ChunkOutcome, RemoteEntry, RemoteStore};

/// Drive rejects intermediate chunks that are not a multiple of this.
pub const CHUNK_ALIGNMENT: usize = 256 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 32 * CHUNK_ALIGNMENT;

/// Rounds `requested` up to a non-zero multiple of [`CHUNK_ALIGNMENT`].
pub fn aligned_chunk_size(requested: usize) -> usize {
    requested.max(1).div_ceil(CHUNK_ALIGNMENT) * CHUNK_ALIGNMENT
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkProgress {
    Partial(f64),
    Done(RemoteEntry),
}

/// One resumable upload session, advanced a chunk at a time.
pub struct ResumableTransfer {
    session: UploadSession,
    file: File,
    offset: u64,
    chunk_size: usize,
}

impl ResumableTransfer {
    /// Opens `source` and a fresh upload session sized to it.
    pub async fn open<R: RemoteStore>(
        remote: &R,
        source: &Path,
        metadata: &FileMetadata,
        chunk_size: usize,
    ) -> Result<Self, SyncError> {
        let file = File::open(source).await?;
        let total_size = file.metadata().await?.len();
        let session = remote
            .create_resumable_upload(metadata, total_size)
            .await
            .map_err(SyncError::ChunkTransfer)?;
        Ok(Self {
            session,
            file,
            offset: 0,
            chunk_size: aligned_chunk_size(chunk_size),
        })
    }

    pub fn total_size(&self) -> u64 {
        self.session.total_size
    }

    /// Sends the chunk starting at the last acknowledged byte.
    pub async fn next_chunk<R: RemoteStore>(
        &mut self,
        remote: &R,
    ) -> Result<ChunkProgress, SyncError> {
        let chunk = self.read_chunk().await?;
        let sent = chunk.len() as u64;
        let outcome = remote
            .send_chunk(&self.session, self.offset, chunk)
            .await
            .map_err(SyncError::ChunkTransfer)?;

        match outcome {
            ChunkOutcome::Complete(entry) => {
                self.offset = self.total_size();
                Ok(ChunkProgress::Done(entry))
            }
            ChunkOutcome::Partial { received } => {
                if (sent > 0 && received <= self.offset) || received > self.total_size() {
                    return Err(SyncError::Stalled {
                        offset: self.offset,
                    });
                }
                self.offset = received;
                Ok(ChunkProgress::Partial(self.fraction()))
            }
        }
    }

    fn fraction(&self) -> f64 {
        match self.total_size() {
            0 => 1.0,
            total => self.offset as f64 / total as f64,
        }
    }

    async fn read_chunk(&mut self) -> Result<Vec<u8>, SyncError> {
        let remaining = self.total_size().saturating_sub(self.offset);
        let want = remaining.min(self.chunk_size as u64);
        self.file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::with_capacity(want as usize);
        (&mut self.file).take(want).read_to_end(&mut chunk).await?;
        if (chunk.len() as u64) < want {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank during upload",
            )
            .into());
        }
        Ok(chunk)
    }
}
