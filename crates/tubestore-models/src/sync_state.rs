//! Per-channel sync checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ChannelId;

/// Status of the last sync run for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No sync in progress.
    #[default]
    Idle,
    /// A sync is currently running.
    Running,
    /// The last sync finished successfully.
    Completed,
    /// The last sync failed.
    Failed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Sync checkpoint for one channel. Keyed by channel ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub channel_id: ChannelId,

    /// When the channel was last synced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,

    /// Number of videos processed by the last sync.
    #[serde(default)]
    pub videos_processed: u64,

    pub status: SyncStatus,

    /// Error message if the last sync failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Stamped by the store on every update.
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Creates an idle sync state for a channel.
    pub fn new(channel_id: impl Into<ChannelId>) -> Self {
        Self {
            channel_id: channel_id.into(),
            last_sync_at: None,
            videos_processed: 0,
            status: SyncStatus::Idle,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Marks a sync as started.
    pub fn start(&mut self) {
        self.status = SyncStatus::Running;
        self.last_error = None;
    }

    /// Marks a sync as finished successfully.
    pub fn complete(&mut self, videos_processed: u64) {
        self.status = SyncStatus::Completed;
        self.videos_processed = videos_processed;
        self.last_sync_at = Some(Utc::now());
        self.last_error = None;
    }

    /// Marks a sync as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SyncStatus::Failed;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_lifecycle() {
        let mut state = SyncState::new("chan-1");
        assert_eq!(state.status, SyncStatus::Idle);
        assert!(state.last_sync_at.is_none());

        state.start();
        assert_eq!(state.status, SyncStatus::Running);

        state.complete(12);
        assert_eq!(state.status, SyncStatus::Completed);
        assert_eq!(state.videos_processed, 12);
        assert!(state.last_sync_at.is_some());
    }

    #[test]
    fn test_fail_keeps_last_sync() {
        let mut state = SyncState::new("chan-1");
        state.complete(3);
        let last = state.last_sync_at;

        state.start();
        state.fail("downloader exited with status 1");

        assert_eq!(state.status, SyncStatus::Failed);
        assert_eq!(state.last_sync_at, last);
        assert_eq!(state.last_error.as_deref(), Some("downloader exited with status 1"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SyncStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
