mod client;
mod oauth;

pub use client::{
    About, ApiErrorClass, ChunkResponse, DEFAULT_BASE_URL, DriveClient, DriveError, DriveFile,
    DriveUser, FOLDER_MIME_TYPE, FileMetadata, ROOT_FOLDER_ID, UploadSession,
};
pub use oauth::{DRIVE_SCOPE, OAuthClient, OAuthError, OAuthToken};
