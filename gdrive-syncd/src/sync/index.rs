use super::error::SyncError;
use super::remote::RemoteStore;

/// Live name lookups against the remote namespace.
///
/// Nothing is cached: Drive allows several entries with one name, so the
/// answer is only as good as the moment it was fetched. When duplicates exist
/// the first match returned by the server wins.
pub struct RemoteIndex<'a, R> {
    remote: &'a R,
}

impl<'a, R: RemoteStore> RemoteIndex<'a, R> {
    pub fn new(remote: &'a R) -> Self {
        Self { remote }
    }

    pub async fn lookup_by_name(&self, name: &str) -> Result<Option<String>, SyncError> {
        let entries = self
            .remote
            .list_by_name(name)
            .await
            .map_err(|source| SyncError::Lookup {
                name: name.to_string(),
                source,
            })?;
        let id = entries.into_iter().next().map(|entry| entry.id);
        tracing::trace!(name, found = id.is_some(), "remote lookup");
        Ok(id)
    }
}
