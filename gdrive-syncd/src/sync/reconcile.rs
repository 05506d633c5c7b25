use super::error::SyncError;
use super::index::RemoteIndex;
use super::remote::RemoteStore;

/// The deepest ancestor known to exist remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// The Drive folder the root marker maps onto; always present.
    Root,
    Folder(String),
}

/// Split point between folders that exist remotely and those that do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBoundary {
    pub last_synced: Anchor,
    /// Folders to create, root to leaf.
    pub unsynced: Vec<String>,
}

/// Finds the longest prefix of `segments` already present remotely.
///
/// Lookups run root to leaf and stop at the first missing folder; everything
/// from there on has to be created, whatever later names happen to match.
pub async fn reconcile<R: RemoteStore>(
    index: &RemoteIndex<'_, R>,
    segments: &[String],
) -> Result<SyncBoundary, SyncError> {
    let mut last_synced = Anchor::Root;
    for (position, name) in segments.iter().enumerate() {
        if index.lookup_by_name(name).await?.is_none() {
            return Ok(SyncBoundary {
                last_synced,
                unsynced: segments[position..].to_vec(),
            });
        }
        last_synced = Anchor::Folder(name.clone());
    }
    Ok(SyncBoundary {
        last_synced,
        unsynced: Vec::new(),
    })
}
