use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes remote folder creation per top-level directory.
///
/// Two paths that could create the same folder always share their first
/// segment, so holding that key's lock across reconcile and materialize keeps
/// concurrent uploads from creating duplicates.
#[derive(Debug, Default, Clone)]
pub struct FolderLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files directly under the root share the empty key.
    pub async fn lock(&self, segments: &[String]) -> OwnedMutexGuard<()> {
        let key = segments.first().cloned().unwrap_or_default();
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key).or_default().clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn segs(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn shared_first_segment_waits() {
        let locks = FolderLocks::new();
        let held = locks.lock(&segs(&["Shows", "S1"])).await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.lock(&segs(&["Shows", "S2"])).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_first_segments_do_not_block() {
        let locks = FolderLocks::new();
        let _shows = locks.lock(&segs(&["Shows"])).await;
        tokio::time::timeout(Duration::from_secs(1), locks.lock(&segs(&["Movies"])))
            .await
            .unwrap();
    }
}
