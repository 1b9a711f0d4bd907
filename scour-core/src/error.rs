use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScourError {
    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Search base directory is empty")]
    EmptyBaseDir,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScourError {
    /// Attach the offending path to not-found and permission errors
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ScourError::PathNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ScourError::PermissionDenied(path.to_path_buf()),
            _ => ScourError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScourError>;
