use std::io;

use gdrive_core::{ApiErrorClass, DriveError};
use thiserror::Error;

use super::paths::PathError;

/// Failures of a single file's sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("lookup of '{name}' failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: DriveError,
    },
    #[error("creating folder '{name}' failed: {source}")]
    Creation {
        name: String,
        #[source]
        source: DriveError,
    },
    #[error("folder '{0}' vanished before its children could be created")]
    MissingAnchor(String),
    #[error("chunk transfer failed: {0}")]
    ChunkTransfer(#[source] DriveError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("upload stalled at byte {offset}")]
    Stalled { offset: u64 },
    #[error("upload abandoned after {attempts} attempts: {last}")]
    RetryBudgetExhausted { attempts: u32, last: Box<SyncError> },
    #[error("path error: {0}")]
    PathParse(#[from] PathError),
    #[error("session error: {0}")]
    Session(String),
}

impl SyncError {
    /// The remote API error at the bottom of this failure, if any.
    pub fn drive_error(&self) -> Option<&DriveError> {
        match self {
            SyncError::Lookup { source, .. } | SyncError::Creation { source, .. } => Some(source),
            SyncError::ChunkTransfer(source) => Some(source),
            SyncError::RetryBudgetExhausted { last, .. } => last.drive_error(),
            _ => None,
        }
    }

    /// Whether the remote reported a condition expected to clear on its own.
    /// Local I/O and stalls never count.
    pub fn is_transient(&self) -> bool {
        self.drive_error().is_some_and(DriveError::is_retryable)
    }

    pub fn is_auth(&self) -> bool {
        self.drive_error()
            .and_then(DriveError::classification)
            .is_some_and(|class| class == ApiErrorClass::Auth)
    }
}
