use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, StatusCode, redirect};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FILE_FIELDS: &str = "id,name,mimeType,parents,size";

/// MIME type Drive uses to mark folder entries.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// Alias Drive accepts for the "My Drive" root folder.
pub const ROOT_FOLDER_ID: &str = "root";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("resumable upload response is missing the session location")]
    MissingUploadSession,
    #[error("invalid range header in upload response: {0}")]
    InvalidRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_options(base_url, token, None)
    }

    /// Builds a client whose every round-trip is bounded by `timeout`.
    ///
    /// Redirects are never followed: the upload protocol answers partial
    /// chunks with `308` and no `Location`, which must reach the caller as-is.
    pub fn with_options(
        base_url: &str,
        token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, DriveError> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Returns a copy of this client authorized with a different access token.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: token.into(),
        }
    }

    pub async fn about(&self) -> Result<About, DriveError> {
        let mut url = self.endpoint("/drive/v3/about")?;
        url.query_pairs_mut().append_pair("fields", "user");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Lists non-trashed entries whose name equals `name` exactly.
    pub async fn list_by_name(&self, name: &str) -> Result<Vec<DriveFile>, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("q", &name_query(name))
            .append_pair("spaces", "drive")
            .append_pair("fields", &format!("files({FILE_FIELDS})"));
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let list: FileList = Self::handle_response(response).await?;
        Ok(list.files)
    }

    pub async fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);
        let metadata = FileMetadata {
            name: name.to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: vec![parent_id.to_string()],
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Opens a resumable upload session for a file of `total_size` bytes.
    pub async fn start_resumable_upload(
        &self,
        metadata: &FileMetadata,
        total_size: u64,
    ) -> Result<UploadSession, DriveError> {
        let mut url = self.endpoint("/upload/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("uploadType", "resumable")
            .append_pair("fields", FILE_FIELDS);
        let mut request = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("X-Upload-Content-Length", total_size.to_string())
            .json(metadata);
        if let Some(mime_type) = metadata.mime_type.as_deref() {
            request = request.header("X-Upload-Content-Type", mime_type);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(DriveError::MissingUploadSession)?;
        let uri = Url::parse(location)?;
        tracing::debug!(name = %metadata.name, total_size, "resumable upload session opened");
        Ok(UploadSession { uri, total_size })
    }

    /// Sends `chunk` starting at byte `offset` of the session's file.
    pub async fn upload_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkResponse, DriveError> {
        let len = chunk.len() as u64;
        let range = content_range(offset, len, session.total_size);
        let response = self
            .http
            .put(session.uri.clone())
            .bearer_auth(&self.token)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::PERMANENT_REDIRECT {
            let received = match response.headers().get(RANGE) {
                Some(value) => {
                    let raw = value
                        .to_str()
                        .map_err(|_| DriveError::InvalidRange("non-ascii header".into()))?;
                    parse_received(raw)?
                }
                None => 0,
            };
            tracing::debug!(received, total = session.total_size, "chunk acknowledged");
            return Ok(ChunkResponse::Incomplete { received });
        }
        let file: DriveFile = Self::handle_response(response).await?;
        Ok(ChunkResponse::Complete(file))
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> DriveError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        DriveError::Api { status, body }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    /// True for network timeouts and for `RateLimit`/`Transient` statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriveError::Request(err) => err.is_timeout() || err.is_connect(),
            _ => matches!(
                self.classification(),
                Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
            ),
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if status == StatusCode::UNAUTHORIZED {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and trashed = false")
}

fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

// "bytes=0-524287" acknowledges 524288 bytes.
fn parse_received(raw: &str) -> Result<u64, DriveError> {
    let last = raw
        .trim()
        .strip_prefix("bytes=")
        .and_then(|range| range.split_once('-'))
        .and_then(|(_, end)| end.parse::<u64>().ok())
        .ok_or_else(|| DriveError::InvalidRange(raw.to_string()))?;
    Ok(last + 1)
}

/// Metadata sent when creating a folder or opening an upload session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    // Drive encodes int64 fields as strings.
    #[serde(default)]
    pub size: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct About {
    pub user: DriveUser,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// An open resumable upload, addressed by its session URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub uri: Url,
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    /// The server holds the first `received` bytes.
    Incomplete { received: u64 },
    Complete(DriveFile),
}
