//! Store configuration.
//!
//! # Environment Variables
//!
//! - `TUBESTORE_DATA_PATH`: Override the dataset file location

use std::path::PathBuf;
use std::time::Duration;

use crate::lock::DEFAULT_POLL_INTERVAL;

/// Environment variable for a custom dataset path.
pub const DATA_PATH_ENV: &str = "TUBESTORE_DATA_PATH";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".tubestore";

/// Default dataset file name.
const DEFAULT_DATA_FILE: &str = "tubestore.json";

/// Default time to wait for another process to release the dataset.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Get the default dataset path.
///
/// Determined by:
/// 1. `TUBESTORE_DATA_PATH` environment variable if set
/// 2. `~/.tubestore/tubestore.json` if a home directory is available
/// 3. `.tubestore/tubestore.json` in the current directory as fallback
pub fn default_data_path() -> PathBuf {
    std::env::var(DATA_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                .join(DEFAULT_DATA_FILE)
        })
}

/// Configuration for opening a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Dataset file.
    pub path: PathBuf,
    /// How long to wait for the cross-process lock.
    pub lock_timeout: Duration,
    /// Delay between lock attempts.
    pub poll_interval: Duration,
    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(default_data_path())
    }
}

impl StoreConfig {
    /// Creates a config for the given dataset file with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            pretty: true,
        }
    }

    /// Sets the lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the lock poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets whether the dataset is written as indented JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Path of the sidecar lock file: `<dataset file name>.lock`.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let config = StoreConfig::new("/data/store.json");

        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(config.pretty);
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new("/data/store.json")
            .with_lock_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(5))
            .with_pretty(false);

        assert_eq!(config.lock_timeout, Duration::from_millis(200));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert!(!config.pretty);
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        let config = StoreConfig::new("/data/store.json");
        assert_eq!(config.lock_path(), PathBuf::from("/data/store.json.lock"));
    }
}
