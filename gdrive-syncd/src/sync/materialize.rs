use super::error::SyncError;
use super::index::RemoteIndex;
use super::reconcile::Anchor;
use super::remote::RemoteStore;

/// Creates missing remote folders beneath an existing anchor.
pub struct DirectoryMaterializer<'a, R> {
    remote: &'a R,
    root_id: &'a str,
}

impl<'a, R: RemoteStore> DirectoryMaterializer<'a, R> {
    pub fn new(remote: &'a R, root_id: &'a str) -> Self {
        Self { remote, root_id }
    }

    /// Creates `unsynced` as a chain below `start` and returns the id of the
    /// innermost folder, or of `start` itself when nothing is missing.
    ///
    /// Creation failures are not retried; folders made before the failure
    /// stay behind.
    pub async fn materialize(
        &self,
        start: &Anchor,
        unsynced: &[String],
    ) -> Result<String, SyncError> {
        let mut parent_id = self.resolve(start).await?;
        for name in unsynced {
            let folder = self
                .remote
                .create_folder(name, &parent_id)
                .await
                .map_err(|source| SyncError::Creation {
                    name: name.clone(),
                    source,
                })?;
            tracing::debug!(name = %name, id = %folder.id, parent = %parent_id, "created remote folder");
            parent_id = folder.id;
        }
        Ok(parent_id)
    }

    async fn resolve(&self, anchor: &Anchor) -> Result<String, SyncError> {
        match anchor {
            Anchor::Root => Ok(self.root_id.to_string()),
            Anchor::Folder(name) => RemoteIndex::new(self.remote)
                .lookup_by_name(name)
                .await?
                .ok_or_else(|| SyncError::MissingAnchor(name.clone())),
        }
    }
}
