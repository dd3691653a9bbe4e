//! Atomic file writes for crash-safe persistence.
//!
//! Output is staged in a temporary file in the destination's directory and
//! renamed over the destination on commit, so the destination always holds
//! either the previous content or the new content, never a partial write.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};

/// A staged rewrite of one file.
///
/// Call exactly one of [`commit`](Self::commit) or [`abort`](Self::abort).
/// A writer dropped without either leaves the destination untouched and its
/// temporary file is removed.
pub struct AtomicWriter {
    path: PathBuf,
    temp: BufWriter<NamedTempFile>,
}

impl AtomicWriter {
    /// Starts a write session for `path`, creating its parent directory if needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir = parent_dir(&path);
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| StoreError::DirectoryError {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        // Same directory as the destination so the rename stays on one filesystem.
        let temp = NamedTempFile::new_in(dir).map_err(|source| StoreError::WriteError {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            temp: BufWriter::new(temp),
        })
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes, syncs and renames the staged file over the destination.
    pub fn commit(self) -> Result<()> {
        let path = self.path;
        let temp = self
            .temp
            .into_inner()
            .map_err(|e| StoreError::WriteError {
                path: path.clone(),
                source: e.into_error(),
            })?;

        temp.as_file()
            .sync_all()
            .map_err(|source| StoreError::WriteError {
                path: path.clone(),
                source,
            })?;

        temp.persist(&path).map_err(|e| StoreError::WriteError {
            path: path.clone(),
            source: e.error,
        })?;

        Ok(())
    }

    /// Discards the staged file. The destination is not touched.
    pub fn abort(self) -> Result<()> {
        let path = self.path;
        let temp = match self.temp.into_inner() {
            Ok(temp) => temp,
            // Unflushed bytes are irrelevant; the temp file is removed on drop.
            Err(e) => {
                drop(e.into_inner());
                return Ok(());
            }
        };
        temp.close()
            .map_err(|source| StoreError::WriteError { path, source })
    }
}

impl Write for AtomicWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Writes data to a file atomically.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let mut writer = AtomicWriter::create(path)?;
    if let Err(source) = writer.write_all(data) {
        writer.abort()?;
        return Err(StoreError::WriteError {
            path: path.to_path_buf(),
            source,
        });
    }
    writer.commit()
}

/// Serializes a value as JSON and writes it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let mut writer = AtomicWriter::create(path)?;
    let written = if pretty {
        serde_json::to_writer_pretty(&mut writer, value)
    } else {
        serde_json::to_writer(&mut writer, value)
    };

    match written {
        Ok(()) => writer.commit(),
        Err(e) => {
            writer.abort()?;
            Err(json_write_error(path, e))
        }
    }
}

/// Classifies a failed JSON write: sink failures are I/O, the rest serialization.
fn json_write_error(path: &Path, e: serde_json::Error) -> StoreError {
    if e.is_io() {
        StoreError::WriteError {
            path: path.to_path_buf(),
            source: e.into(),
        }
    } else {
        StoreError::SerializeError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn dir_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");

        atomic_write(&path, b"hello world").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/test.txt");

        atomic_write(&path, b"nested content").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_atomic_write_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        atomic_write_json(&path, &data, false).unwrap();

        let loaded: TestData = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(data, loaded);
    }

    #[test]
    fn test_commit_replaces_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        atomic_write(&path, b"old").unwrap();

        let mut writer = AtomicWriter::create(&path).unwrap();
        writer.write_all(b"new").unwrap();
        // Not visible until commit.
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        writer.commit().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn test_abort_leaves_destination_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        atomic_write_json(&path, &TestData { name: "a".into(), value: 1 }, true).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let mut writer = AtomicWriter::create(&path).unwrap();
        writer.write_all(b"{\"name\": \"trunc").unwrap();
        writer.abort().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn test_dropped_writer_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");

        {
            let mut writer = AtomicWriter::create(&path).unwrap();
            writer.write_all(b"partial").unwrap();
        }

        assert!(!path.exists());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    #[test]
    fn test_sink_failure_is_write_error() {
        let path = Path::new("/data/store.json");
        let data = TestData {
            name: "x".to_string(),
            value: 1,
        };
        let e = serde_json::to_writer(FullDisk, &data).unwrap_err();

        let err = json_write_error(path, e);

        assert!(matches!(err, StoreError::WriteError { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_encoding_failure_is_serialize_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let err = atomic_write_json(&path, &Unserializable, false).unwrap_err();

        assert!(matches!(err, StoreError::SerializeError(_)));
        assert!(!path.exists());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn test_failed_rename_keeps_previous_content() {
        let dir = tempdir().unwrap();
        // A non-empty directory at the destination makes the rename fail.
        let path = dir.path().join("target");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), "kept").unwrap();

        let mut writer = AtomicWriter::create(&path).unwrap();
        writer.write_all(b"replacement").unwrap();
        let err = writer.commit().unwrap_err();

        assert!(matches!(err, StoreError::WriteError { .. }));
        assert_eq!(fs::read_to_string(path.join("keep.txt")).unwrap(), "kept");
        assert_eq!(dir_entries(dir.path()), 1);
    }
}
