// src/errors.rs

//! Crate-wide error types.
//!
//! The taxonomy follows where a failure is detected:
//! - [`FileAccessError`]: validation time, before a watcher exists.
//! - [`WatcherError`]: runtime, reported by an active tail reader.
//! - [`CapacityError`]: soft, the rule set exceeds the watcher cap.
//! - [`ConfigurationPersistError`]: bubbled up from the configuration store.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a configured file cannot be watched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileAccessError {
    #[error("file does not exist: {0:?}")]
    Missing(PathBuf),

    #[error("path is a directory: {0:?}")]
    IsDirectory(PathBuf),

    #[error("file is not readable: {0:?}")]
    Unreadable(PathBuf),

    #[error("cannot subscribe to changes of {0:?}: {1}")]
    WatchUnavailable(PathBuf, String),
}

impl FileAccessError {
    pub fn path(&self) -> &Path {
        match self {
            FileAccessError::Missing(p)
            | FileAccessError::IsDirectory(p)
            | FileAccessError::Unreadable(p)
            | FileAccessError::WatchUnavailable(p, _) => p,
        }
    }

    /// Map an error from opening a file into the validation taxonomy.
    pub fn from_open_error(err: &io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileAccessError::Missing(path.to_path_buf()),
            io::ErrorKind::IsADirectory => FileAccessError::IsDirectory(path.to_path_buf()),
            _ => FileAccessError::Unreadable(path.to_path_buf()),
        }
    }
}

/// Failure reported by a running tail reader. The reader stops itself after
/// reporting one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatcherError {
    #[error("watched file was deleted: {0:?}")]
    FileDeleted(PathBuf),

    #[error("permission denied while reading {0:?}")]
    PermissionDenied(PathBuf),

    #[error("file descriptor became invalid for {0:?}")]
    DescriptorInvalid(PathBuf),
}

impl WatcherError {
    pub fn path(&self) -> &Path {
        match self {
            WatcherError::FileDeleted(p)
            | WatcherError::PermissionDenied(p)
            | WatcherError::DescriptorInvalid(p) => p,
        }
    }

    /// Short label used in alert titles and logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            WatcherError::FileDeleted(_) => "file deleted",
            WatcherError::PermissionDenied(_) => "permission denied",
            WatcherError::DescriptorInvalid(_) => "descriptor invalid",
        }
    }
}

/// Classify an IO error raised while seeking or reading a watched file.
///
/// - not found -> `FileDeleted`
/// - EACCES / EPERM -> `PermissionDenied`
/// - anything else (EBADF, unexpected seek/read failures) -> `DescriptorInvalid`
pub fn classify_io_error(err: &io::Error, path: &Path) -> WatcherError {
    match err.kind() {
        io::ErrorKind::NotFound => WatcherError::FileDeleted(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => WatcherError::PermissionDenied(path.to_path_buf()),
        _ => WatcherError::DescriptorInvalid(path.to_path_buf()),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    #[error("{requested} rules are enabled but at most {limit} files can be watched at once")]
    WatcherLimitExceeded { requested: usize, limit: usize },
}

#[derive(Error, Debug)]
#[error("failed to persist configuration: {0}")]
pub struct ConfigurationPersistError(pub String);

impl From<anyhow::Error> for ConfigurationPersistError {
    fn from(err: anyhow::Error) -> Self {
        ConfigurationPersistError(format!("{err:#}"))
    }
}

#[derive(Error, Debug)]
pub enum LogbeaconError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid pattern for rule '{rule}': {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    #[error(transparent)]
    FileAccess(#[from] FileAccessError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Persist(#[from] ConfigurationPersistError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LogbeaconError>;
