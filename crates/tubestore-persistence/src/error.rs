//! Error types for store operations.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The entity collection an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Channel,
    Video,
    Transcript,
    SyncState,
    Dataset,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Channel => "channel",
            EntityKind::Video => "video",
            EntityKind::Transcript => "transcript",
            EntityKind::SyncState => "sync state",
            EntityKind::Dataset => "dataset",
        };
        f.write_str(s)
    }
}

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    StorageCorrupt,
    LockTimeout,
    Io,
    Other,
}

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entity absent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Internal or external ID collision.
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: EntityKind, key: String },

    /// The dataset file is unreadable as a dataset, or an index points at a missing entry.
    #[error("storage corrupt at {path}: {reason}")]
    StorageCorrupt { path: PathBuf, reason: String },

    /// Another process holds the dataset lock.
    #[error("timed out after {timeout:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// The dataset was written by a newer version.
    #[error("unsupported dataset version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Failed to read from file system.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to file system.
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open or lock the lock file.
    #[error("failed to lock {path}: {source}")]
    LockError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize data to JSON.
    #[error("failed to serialize: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Invalid caller input.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A mutating operation failed to persist.
    #[error("{op} {kind} {id}: {source}")]
    Operation {
        op: &'static str,
        kind: EntityKind,
        id: String,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub(crate) fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: EntityKind, key: impl fmt::Display) -> Self {
        StoreError::AlreadyExists {
            kind,
            key: key.to_string(),
        }
    }

    /// Classifies this error, looking through operation context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StoreError::StorageCorrupt { .. } => ErrorKind::StorageCorrupt,
            StoreError::LockTimeout { .. } => ErrorKind::LockTimeout,
            StoreError::ReadError { .. }
            | StoreError::WriteError { .. }
            | StoreError::DirectoryError { .. }
            | StoreError::LockError { .. } => ErrorKind::Io,
            StoreError::Operation { source, .. } => source.kind(),
            StoreError::UnsupportedVersion { .. }
            | StoreError::SerializeError(_)
            | StoreError::InvalidData(_)
            | StoreError::LockPoisoned(_) => ErrorKind::Other,
        }
    }

    /// True if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
