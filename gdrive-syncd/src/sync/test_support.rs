//! In-memory remote store for exercising the sync core without HTTP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gdrive_core::{DriveError, FileMetadata, UploadSession};
use reqwest::StatusCode;
use url::Url;

use super::error::SyncError;
use super::remote::{ChunkOutcome, EntryKind, RemoteEntry, RemoteSource, RemoteStore};

#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    entries: Vec<RemoteEntry>,
    next_id: u64,
    lookups: usize,
    created: Vec<RemoteEntry>,
    fail_lookups: bool,
    fail_creates: bool,
    chunk_failures: u32,
    chunk_failure_delay: usize,
    chunk_sends: usize,
    sessions_opened: usize,
    stall: bool,
    sessions: HashMap<String, PendingUpload>,
    uploads: Vec<(RemoteEntry, Vec<u8>)>,
}

struct PendingUpload {
    metadata: FileMetadata,
    total_size: u64,
    data: Vec<u8>,
}

fn api_error(status: StatusCode) -> DriveError {
    DriveError::Api {
        status,
        body: "fake failure".into(),
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_folder(&self, name: &str, parent: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.entries.push(RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
            kind: EntryKind::Folder,
            parent: Some(parent.to_string()),
        });
        id
    }

    pub fn fail_lookups(&self) {
        self.state.lock().unwrap().fail_lookups = true;
    }

    pub fn fail_creates(&self) {
        self.state.lock().unwrap().fail_creates = true;
    }

    /// The next `count` chunk sends fail with a transient server error.
    pub fn fail_next_chunks(&self, count: u32) {
        self.fail_chunks_after(0, count);
    }

    /// Lets `successes` chunk sends through, then fails the next `count`.
    pub fn fail_chunks_after(&self, successes: usize, count: u32) {
        let mut state = self.state.lock().unwrap();
        state.chunk_failure_delay = successes;
        state.chunk_failures = count;
    }

    /// Chunks are acknowledged without the server keeping any bytes.
    pub fn stall_uploads(&self) {
        self.state.lock().unwrap().stall = true;
    }

    pub fn lookup_count(&self) -> usize {
        self.state.lock().unwrap().lookups
    }

    pub fn created_folders(&self) -> Vec<RemoteEntry> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn chunk_sends(&self) -> usize {
        self.state.lock().unwrap().chunk_sends
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions_opened
    }

    pub fn uploads(&self) -> Vec<(RemoteEntry, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }
}

impl FakeState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("id-{}", self.next_id)
    }
}

impl RemoteStore for FakeRemote {
    async fn list_by_name(&self, name: &str) -> Result<Vec<RemoteEntry>, DriveError> {
        // Suspend like a real round-trip so concurrent pipelines interleave.
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        if state.fail_lookups {
            return Err(api_error(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.name == name)
            .cloned()
            .collect())
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteEntry, DriveError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_creates {
            return Err(api_error(StatusCode::FORBIDDEN));
        }
        let entry = RemoteEntry {
            id: state.allocate_id(),
            name: name.to_string(),
            kind: EntryKind::Folder,
            parent: Some(parent_id.to_string()),
        };
        state.entries.push(entry.clone());
        state.created.push(entry.clone());
        Ok(entry)
    }

    async fn create_resumable_upload(
        &self,
        metadata: &FileMetadata,
        total_size: u64,
    ) -> Result<UploadSession, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.sessions_opened += 1;
        let uri = Url::parse(&format!(
            "https://upload.test/session/{}",
            state.sessions_opened
        ))?;
        state.sessions.insert(
            uri.to_string(),
            PendingUpload {
                metadata: metadata.clone(),
                total_size,
                data: Vec::new(),
            },
        );
        Ok(UploadSession { uri, total_size })
    }

    async fn send_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkOutcome, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.chunk_sends += 1;
        if state.chunk_failure_delay > 0 {
            state.chunk_failure_delay -= 1;
        } else if state.chunk_failures > 0 {
            state.chunk_failures -= 1;
            return Err(api_error(StatusCode::SERVICE_UNAVAILABLE));
        }
        let stall = state.stall;
        let pending = state
            .sessions
            .get_mut(session.uri.as_str())
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND))?;
        if offset != pending.data.len() as u64 {
            return Err(DriveError::InvalidRange(format!(
                "expected offset {}, got {offset}",
                pending.data.len()
            )));
        }
        if stall {
            return Ok(ChunkOutcome::Partial { received: offset });
        }
        pending.data.extend_from_slice(&chunk);
        let received = pending.data.len() as u64;
        if received < pending.total_size {
            return Ok(ChunkOutcome::Partial { received });
        }

        let Some(pending) = state.sessions.remove(session.uri.as_str()) else {
            return Err(api_error(StatusCode::NOT_FOUND));
        };
        let entry = RemoteEntry {
            id: state.allocate_id(),
            name: pending.metadata.name.clone(),
            kind: EntryKind::File,
            parent: pending.metadata.parents.first().cloned(),
        };
        state.entries.push(entry.clone());
        state.uploads.push((entry.clone(), pending.data));
        Ok(ChunkOutcome::Complete(entry))
    }
}

impl RemoteSource for FakeRemote {
    type Remote = FakeRemote;

    async fn acquire(&self) -> Result<FakeRemote, SyncError> {
        Ok(self.clone())
    }
}
