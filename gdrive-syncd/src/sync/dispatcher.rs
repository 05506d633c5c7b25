use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};

use super::error::SyncError;
use super::paths::LocalPathSegments;
use super::remote::RemoteEntry;

/// Browsers write in-flight downloads under this suffix.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".part";
/// Finder metadata; never worth uploading.
pub const OS_METADATA_FILE: &str = ".DS_Store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created { path: PathBuf, is_directory: bool },
    /// A rename, carrying only where the entry ended up.
    Moved { destination: PathBuf, is_directory: bool },
    Other,
}

impl FsEvent {
    /// The path worth uploading, if this event names a finished file.
    pub fn accepted_path(&self) -> Option<&Path> {
        let path = match self {
            FsEvent::Created {
                path,
                is_directory: false,
            } => path,
            FsEvent::Moved {
                destination,
                is_directory: false,
            } => destination,
            _ => return None,
        };
        let ignored = path.to_string_lossy().ends_with(PARTIAL_DOWNLOAD_SUFFIX)
            || path
                .file_name()
                .is_some_and(|name| name == OS_METADATA_FILE);
        (!ignored).then_some(path.as_path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub local_path: PathBuf,
    pub segments: LocalPathSegments,
}

/// Reconcile, materialize and upload for one file.
pub trait UploadPipeline: Send + Sync + 'static {
    fn run(&self, job: UploadJob) -> impl Future<Output = Result<RemoteEntry, SyncError>> + Send;
}

/// Turns filesystem events into pipeline runs.
pub struct Dispatcher<P> {
    pipeline: Arc<P>,
    root_marker: String,
    limit: Arc<Semaphore>,
}

impl<P: UploadPipeline> Dispatcher<P> {
    pub fn new(pipeline: P, root_marker: impl Into<String>, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            root_marker: root_marker.into(),
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// `Ok(None)` for events that are filtered out.
    pub fn job_for(&self, event: &FsEvent) -> Result<Option<UploadJob>, SyncError> {
        let Some(path) = event.accepted_path() else {
            return Ok(None);
        };
        let segments = LocalPathSegments::from_path(path, &self.root_marker)?;
        Ok(Some(UploadJob {
            local_path: path.to_path_buf(),
            segments,
        }))
    }

    /// Runs one event to completion. Failures are logged, never returned.
    pub async fn handle(&self, event: FsEvent) -> Option<RemoteEntry> {
        let job = match self.job_for(&event) {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::trace!(?event, "ignoring event");
                return None;
            }
            Err(err) => {
                tracing::error!(?event, error = %err, "cannot map event to a remote path");
                return None;
            }
        };
        run_job(self.pipeline.as_ref(), job).await
    }

    /// Consumes events until the channel closes, running up to the configured
    /// number of pipelines at once.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<FsEvent>) {
        let mut tasks = JoinSet::new();
        while let Some(event) = events.recv().await {
            while let Some(joined) = tasks.try_join_next() {
                log_join_failure(joined);
            }
            let job = match self.job_for(&event) {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(err) => {
                    tracing::error!(?event, error = %err, "cannot map event to a remote path");
                    continue;
                }
            };
            let Ok(permit) = self.limit.clone().acquire_owned().await else {
                break;
            };
            let pipeline = self.pipeline.clone();
            tasks.spawn(async move {
                let _permit = permit;
                run_job(pipeline.as_ref(), job).await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            log_join_failure(joined);
        }
    }
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        tracing::error!(error = %err, panicked = err.is_panic(), "sync task aborted");
    }
}

async fn run_job<P: UploadPipeline>(pipeline: &P, job: UploadJob) -> Option<RemoteEntry> {
    let local_path = job.local_path.clone();
    tracing::info!(
        file = %local_path.display(),
        remote = %job.segments.remote_path(),
        "syncing file"
    );
    match pipeline.run(job).await {
        Ok(entry) => Some(entry),
        Err(err) => {
            tracing::error!(file = %local_path.display(), error = %err, "sync failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::remote::EntryKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPipeline {
        jobs: Mutex<Vec<UploadJob>>,
        fail: bool,
        panic_on: Option<&'static str>,
    }

    impl UploadPipeline for RecordingPipeline {
        async fn run(&self, job: UploadJob) -> Result<RemoteEntry, SyncError> {
            let name = job.segments.file_name.clone();
            self.jobs.lock().unwrap().push(job);
            if self.panic_on == Some(name.as_str()) {
                panic!("pipeline crashed on {name}");
            }
            if self.fail {
                return Err(SyncError::Session("offline".into()));
            }
            Ok(RemoteEntry {
                id: format!("id-{name}"),
                name,
                kind: EntryKind::File,
                parent: None,
            })
        }
    }

    fn created(path: &str) -> FsEvent {
        FsEvent::Created {
            path: path.into(),
            is_directory: false,
        }
    }

    fn moved(path: &str) -> FsEvent {
        FsEvent::Moved {
            destination: path.into(),
            is_directory: false,
        }
    }

    fn dispatcher(fail: bool) -> Dispatcher<RecordingPipeline> {
        Dispatcher::new(
            RecordingPipeline {
                fail,
                ..Default::default()
            },
            "Media",
            1,
        )
    }

    fn jobs(dispatcher: &Dispatcher<RecordingPipeline>) -> Vec<UploadJob> {
        dispatcher.pipeline.jobs.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn partial_downloads_and_metadata_are_ignored() {
        let dispatcher = dispatcher(false);
        assert!(dispatcher.handle(created("/root/Media/x.mp4.part")).await.is_none());
        assert!(dispatcher.handle(created("/root/Media/Shows/.DS_Store")).await.is_none());
        assert!(dispatcher.handle(moved("/root/Media/y.part")).await.is_none());
        assert!(jobs(&dispatcher).is_empty());
    }

    #[tokio::test]
    async fn directories_and_other_events_are_ignored() {
        let dispatcher = dispatcher(false);
        let folder = FsEvent::Created {
            path: "/root/Media/Shows".into(),
            is_directory: true,
        };
        assert!(dispatcher.handle(folder).await.is_none());
        assert!(dispatcher.handle(FsEvent::Other).await.is_none());
        assert!(jobs(&dispatcher).is_empty());
    }

    #[tokio::test]
    async fn created_file_runs_pipeline_once() {
        let dispatcher = dispatcher(false);
        let entry = dispatcher
            .handle(created("/root/Media/Shows/S1/ep1.mp4"))
            .await
            .unwrap();

        assert_eq!(entry.name, "ep1.mp4");
        let jobs = jobs(&dispatcher);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].segments.directories, vec!["Shows", "S1"]);
        assert_eq!(jobs[0].local_path, PathBuf::from("/root/Media/Shows/S1/ep1.mp4"));
    }

    #[tokio::test]
    async fn moved_file_uses_destination() {
        let dispatcher = dispatcher(false);
        dispatcher.handle(moved("/root/Media/Movies/film.mkv")).await;

        let jobs = jobs(&dispatcher);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].segments.directories, vec!["Movies"]);
        assert_eq!(jobs[0].segments.file_name, "film.mkv");
    }

    #[tokio::test]
    async fn path_outside_marker_is_dropped() {
        let dispatcher = dispatcher(false);
        assert!(dispatcher.handle(created("/tmp/elsewhere/a.txt")).await.is_none());
        assert!(jobs(&dispatcher).is_empty());
    }

    #[tokio::test]
    async fn pipeline_failure_does_not_stop_the_loop() {
        let dispatcher = dispatcher(true);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(created("/root/Media/a.txt")).unwrap();
        tx.send(created("/root/Media/b.part")).unwrap();
        tx.send(created("/root/Media/c.txt")).unwrap();
        drop(tx);

        dispatcher.run(rx).await;

        let names: Vec<_> = jobs(&dispatcher)
            .into_iter()
            .map(|job| job.segments.file_name)
            .collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn panicking_task_is_reaped_and_loop_continues() {
        let dispatcher = Dispatcher::new(
            RecordingPipeline {
                panic_on: Some("a.txt"),
                ..Default::default()
            },
            "Media",
            2,
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(created("/root/Media/a.txt")).unwrap();
        tx.send(created("/root/Media/b.txt")).unwrap();
        drop(tx);

        dispatcher.run(rx).await;

        let mut names: Vec<_> = jobs(&dispatcher)
            .into_iter()
            .map(|job| job.segments.file_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn join_failures_are_absorbed() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let joined = runtime.block_on(async {
            let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("boom") });
            handle.await
        });
        assert!(joined.as_ref().is_err_and(JoinError::is_panic));
        log_join_failure(joined);
        log_join_failure(Ok(()));
    }
}
