pub mod dispatcher;
pub mod error;
pub mod index;
pub mod local_watcher;
pub mod locks;
pub mod materialize;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod transfer;
pub mod upload;

#[cfg(test)]
mod test_support;
