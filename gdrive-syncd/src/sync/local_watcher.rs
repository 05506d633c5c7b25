use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::dispatcher::FsEvent;

pub fn start_notify_watcher(
    root: &Path,
) -> notify::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<FsEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for local in map_event(event) {
                let _ = tx.send(local);
            }
        }
        Err(err) => tracing::warn!(error = %err, "filesystem watch error"),
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "watching for new files");
    Ok((watcher, rx))
}

fn map_event(event: Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(kind) => event
            .paths
            .into_iter()
            .map(|path| {
                let is_directory = match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    _ => path.is_dir(),
                };
                FsEvent::Created { path, is_directory }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(moved).collect()
        }
        // Backends that cannot pair renames report each side separately;
        // only the side that still exists is the destination.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .into_iter()
            .filter(|path| path.exists())
            .map(moved)
            .collect(),
        // `Name(Both)` repeats a rename inotify already reported as `To`.
        _ => vec![FsEvent::Other],
    }
}

fn moved(destination: PathBuf) -> FsEvent {
    let is_directory = destination.is_dir();
    FsEvent::Moved {
        destination,
        is_directory,
    }
}
