use super::*;
use crate::sync::transfer::CHUNK_ALIGNMENT;
use std::collections::HashMap;

fn config_from(pairs: &[(&str, &str)]) -> DaemonConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    DaemonConfig::from_vars(Path::new("/tmp/home-user"), |name| vars.get(name).cloned())
}

#[test]
fn expands_tilde_to_home_watch_dir() {
    let home = PathBuf::from("/tmp/home-user");
    assert_eq!(
        expand_with_home("~/Media", &home),
        PathBuf::from("/tmp/home-user/Media")
    );
    assert_eq!(expand_with_home("~", &home), home);
    assert_eq!(expand_with_home("/srv/Media", &home), PathBuf::from("/srv/Media"));
}

#[test]
fn defaults_match_sequential_sync() {
    let config = config_from(&[]);
    assert_eq!(config.watch_dir, PathBuf::from("/tmp/home-user/Media"));
    assert_eq!(config.root_marker, "Media");
    assert_eq!(config.root_folder_id, "root");
    assert_eq!(config.retry_budget, 10);
    assert_eq!(config.chunk_size, 8 * 1024 * 1024);
    assert_eq!(config.upload_concurrency, 1);
    assert_eq!(config.request_timeout, Duration::from_secs(300));
    assert_eq!(
        config.credentials_path,
        PathBuf::from("/tmp/home-user/.credentials/drive-rust-sync.json")
    );
    assert_eq!(config.client_secret_file, PathBuf::from(".google-api-keys.json"));
}

#[test]
fn reads_overrides_from_env() {
    let config = config_from(&[
        ("GDRIVE_WATCH_DIR", "~/Downloads/Media"),
        ("GDRIVE_ROOT_MARKER", "Downloads"),
        ("GDRIVE_ROOT_FOLDER_ID", "folder-123"),
        ("GDRIVE_UPLOAD_RETRIES", "3"),
        ("GDRIVE_UPLOAD_CONCURRENCY", "4"),
        ("GDRIVE_REQUEST_TIMEOUT_SECS", "30"),
        ("GDRIVE_CREDENTIALS_PATH", "/etc/gdrive/creds.json"),
    ]);
    assert_eq!(config.watch_dir, PathBuf::from("/tmp/home-user/Downloads/Media"));
    assert_eq!(config.root_marker, "Downloads");
    assert_eq!(config.root_folder_id, "folder-123");
    assert_eq!(config.retry_budget, 3);
    assert_eq!(config.upload_concurrency, 4);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.credentials_path, PathBuf::from("/etc/gdrive/creds.json"));
}

#[test]
fn chunk_size_rounds_up_to_alignment() {
    let config = config_from(&[("GDRIVE_CHUNK_SIZE", "1000000")]);
    assert_eq!(config.chunk_size, 4 * CHUNK_ALIGNMENT);
}

#[test]
fn invalid_numbers_fall_back_to_defaults() {
    let config = config_from(&[
        ("GDRIVE_UPLOAD_RETRIES", "many"),
        ("GDRIVE_UPLOAD_CONCURRENCY", "0"),
        ("GDRIVE_ROOT_MARKER", "  "),
    ]);
    assert_eq!(config.retry_budget, 10);
    assert_eq!(config.upload_concurrency, 1);
    assert_eq!(config.root_marker, "Media");
}

#[test]
fn detects_marker_in_watch_dir() {
    assert!(has_marker_component(Path::new("/home/u/Media"), "Media"));
    assert!(has_marker_component(Path::new("/home/u/Media/inbox"), "Media"));
    assert!(!has_marker_component(Path::new("/home/u/MediaLibrary"), "Media"));
}
