use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Local directory that maps onto the Drive root.
pub const DEFAULT_ROOT_MARKER: &str = "Media";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("root marker '{marker}' not found in {}", .path.display())]
    MissingRootMarker { marker: String, path: PathBuf },
    #[error("no file name below the root marker in {}", .0.display())]
    MissingFileName(PathBuf),
    #[error("path contains unsupported component: {}", .0.display())]
    UnsupportedComponent(PathBuf),
}

/// The remote-relative view of a local file: the folders between the root
/// marker and the file, root to leaf, plus the file's own name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPathSegments {
    pub directories: Vec<String>,
    pub file_name: String,
}

impl LocalPathSegments {
    pub fn from_path(path: &Path, root_marker: &str) -> Result<Self, PathError> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => continue,
                Component::ParentDir => {
                    return Err(PathError::UnsupportedComponent(path.to_path_buf()));
                }
            }
        }

        let marker_index = parts
            .iter()
            .position(|part| part == root_marker)
            .ok_or_else(|| PathError::MissingRootMarker {
                marker: root_marker.to_string(),
                path: path.to_path_buf(),
            })?;
        let mut below = parts.split_off(marker_index + 1);
        let file_name = below
            .pop()
            .ok_or_else(|| PathError::MissingFileName(path.to_path_buf()))?;

        Ok(Self {
            directories: below,
            file_name,
        })
    }

    /// Slash-joined remote path, for log output.
    pub fn remote_path(&self) -> String {
        let mut out = self.directories.join("/");
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&self.file_name);
        out
    }
}
