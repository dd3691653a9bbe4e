//! Locked single-file document store.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tubestore_models::{Channel, ChannelId, SyncState, Transcript, Video, VideoId};

use crate::atomic::atomic_write_json;
use crate::config::StoreConfig;
use crate::dataset::{Dataset, IntegrityReport, StoreStats};
use crate::error::{EntityKind, Result, StoreError};
use crate::lock::FileLock;

/// Persistent store for channels, videos, transcripts and sync state.
///
/// The dataset file is locked against other processes for as long as the
/// store is open. Within a process, reads share and writes exclude one
/// another through a single `RwLock`. Every successful write rewrites the
/// whole dataset atomically before it returns.
///
/// Reads return owned copies; changing them has no effect until passed back
/// through an update.
///
/// ```no_run
/// use tubestore_models::{Channel, Video};
/// use tubestore_persistence::Store;
///
/// let store = Store::open_path("/tmp/tubestore.json").unwrap();
///
/// let mut channel = Channel::new("UCabc", "Test");
/// store.create_channel(&mut channel).unwrap();
///
/// let mut video = Video::new("vid1", channel.id.clone());
/// store.create_video(&mut video).unwrap();
///
/// store.close().unwrap();
/// ```
pub struct Store {
    config: StoreConfig,
    lock: FileLock,
    state: RwLock<Dataset>,
}

impl Store {
    /// Opens the dataset at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::new(path.as_ref()))
    }

    /// Locks and loads the dataset, creating an empty one if the file is missing.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StoreError::DirectoryError {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let lock = FileLock::acquire_with_interval(
            config.lock_path(),
            config.lock_timeout,
            config.poll_interval,
        )?;

        let dataset = match fs::read_to_string(&config.path) {
            Ok(json) => {
                let (dataset, rebuilt) = Dataset::from_json(&config.path, &json)?;
                if rebuilt {
                    warn!(path = %config.path.display(), "Dataset had no indexes, rebuilt from collections");
                    atomic_write_json(&config.path, &dataset, config.pretty)?;
                }
                let stats = dataset.stats();
                info!(
                    path = %config.path.display(),
                    channels = stats.channels,
                    videos = stats.videos,
                    transcripts = stats.transcripts,
                    "Loaded dataset"
                );
                dataset
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let dataset = Dataset::new(&config.path);
                // Write now so permission or disk problems show up at open.
                atomic_write_json(&config.path, &dataset, config.pretty)?;
                info!(path = %config.path.display(), "Initialized empty dataset");
                dataset
            }
            Err(source) => {
                return Err(StoreError::ReadError {
                    path: config.path.clone(),
                    source,
                });
            }
        };

        Ok(Self {
            config,
            lock,
            state: RwLock::new(dataset),
        })
    }

    /// Releases the cross-process lock. Dropping the store does the same.
    pub fn close(mut self) -> Result<()> {
        self.lock.release()?;
        info!(path = %self.config.path.display(), "Closed dataset");
        Ok(())
    }

    /// Dataset file path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Dataset>> {
        self.state
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Dataset>> {
        self.state
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Applies `f` to a copy of the dataset, persists the copy and installs it.
    ///
    /// If `f` or the write fails the live dataset is unchanged.
    fn mutate<T>(
        &self,
        op: &'static str,
        kind: EntityKind,
        id: &str,
        f: impl FnOnce(&mut Dataset, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let mut live = self.write()?;
        let mut next = live.clone();
        let now = Utc::now();

        let value = f(&mut next, now)?;
        next.touch(now);

        atomic_write_json(&self.config.path, &next, self.config.pretty).map_err(|source| {
            StoreError::Operation {
                op,
                kind,
                id: id.to_string(),
                source: Box::new(source),
            }
        })?;
        debug!(op, %kind, id, path = %self.config.path.display(), "Persisted dataset");

        *live = next;
        Ok(value)
    }

    // ---- channels ----

    /// Creates a channel. The assigned ID and timestamps are written back to `channel`.
    pub fn create_channel(&self, channel: &mut Channel) -> Result<()> {
        let mut candidate = channel.clone();
        if candidate.id.is_unassigned() {
            candidate.id = ChannelId::generate();
        }
        let id = candidate.id.to_string();
        *channel = self.mutate("create", EntityKind::Channel, &id, |ds, now| {
            ds.insert_channel(candidate, now)
        })?;
        debug!(id = %channel.id, external_id = %channel.external_id, "Created channel");
        Ok(())
    }

    pub fn get_channel(&self, id: &ChannelId) -> Result<Channel> {
        Ok(self.read()?.channel(id)?.clone())
    }

    pub fn get_channel_by_external_id(&self, external_id: &str) -> Result<Channel> {
        Ok(self.read()?.channel_by_external_id(external_id)?.clone())
    }

    /// All channels, oldest first.
    pub fn list_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.read()?.channels().into_iter().cloned().collect())
    }

    /// Updates a channel. The refreshed timestamps are written back to `channel`.
    pub fn update_channel(&self, channel: &mut Channel) -> Result<()> {
        let candidate = channel.clone();
        let id = candidate.id.to_string();
        *channel = self.mutate("update", EntityKind::Channel, &id, |ds, now| {
            ds.update_channel(candidate, now)
        })?;
        Ok(())
    }

    /// Deletes a channel together with its videos, their transcripts and its sync state.
    pub fn delete_channel(&self, id: &ChannelId) -> Result<()> {
        let (channel, videos) = self.mutate("delete", EntityKind::Channel, id.as_str(), |ds, _| {
            ds.remove_channel(id)
        })?;
        info!(id = %id, external_id = %channel.external_id, videos, "Deleted channel");
        Ok(())
    }

    // ---- videos ----

    /// Creates a video under an existing channel.
    pub fn create_video(&self, video: &mut Video) -> Result<()> {
        let mut candidate = video.clone();
        if candidate.id.is_unassigned() {
            candidate.id = VideoId::generate();
        }
        let id = candidate.id.to_string();
        *video = self.mutate("create", EntityKind::Video, &id, |ds, now| {
            ds.insert_video(candidate, now)
        })?;
        debug!(id = %video.id, external_id = %video.external_id, channel_id = %video.channel_id, "Created video");
        Ok(())
    }

    pub fn get_video(&self, id: &VideoId) -> Result<Video> {
        Ok(self.read()?.video(id)?.clone())
    }

    pub fn get_video_by_external_id(&self, external_id: &str) -> Result<Video> {
        Ok(self.read()?.video_by_external_id(external_id)?.clone())
    }

    /// All videos, oldest first.
    pub fn list_videos(&self) -> Result<Vec<Video>> {
        Ok(self.read()?.videos().into_iter().cloned().collect())
    }

    /// A channel's videos in the order they were added. Unknown channels yield none.
    pub fn list_videos_by_channel(&self, channel_id: &ChannelId) -> Result<Vec<Video>> {
        let dataset = self.read()?;
        Ok(dataset
            .videos_by_channel(channel_id)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Videos that have no transcript yet.
    pub fn list_videos_needing_transcript(&self) -> Result<Vec<Video>> {
        Ok(self
            .read()?
            .videos_needing_transcript()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Updates a video. `has_transcript` is managed by the store and ignored here.
    pub fn update_video(&self, video: &mut Video) -> Result<()> {
        let candidate = video.clone();
        let id = candidate.id.to_string();
        *video = self.mutate("update", EntityKind::Video, &id, |ds, now| {
            ds.update_video(candidate, now)
        })?;
        Ok(())
    }

    /// Deletes a video and its transcript.
    pub fn delete_video(&self, id: &VideoId) -> Result<()> {
        self.mutate("delete", EntityKind::Video, id.as_str(), |ds, _| {
            ds.remove_video(id)
        })?;
        debug!(id = %id, "Deleted video");
        Ok(())
    }

    // ---- transcripts ----

    /// Stores a transcript and marks its video as transcribed.
    pub fn create_transcript(&self, transcript: &mut Transcript) -> Result<()> {
        let candidate = transcript.clone();
        let id = candidate.video_id.to_string();
        *transcript = self.mutate("create", EntityKind::Transcript, &id, |ds, now| {
            ds.insert_transcript(candidate, now)
        })?;
        debug!(video_id = %transcript.video_id, language = %transcript.language, "Created transcript");
        Ok(())
    }

    pub fn get_transcript(&self, video_id: &VideoId) -> Result<Transcript> {
        Ok(self.read()?.transcript(video_id)?.clone())
    }

    /// Transcripts of a channel's videos, in the channel's video order.
    pub fn list_transcripts_by_channel(&self, channel_id: &ChannelId) -> Result<Vec<Transcript>> {
        Ok(self
            .read()?
            .transcripts_by_channel(channel_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn update_transcript(&self, transcript: &mut Transcript) -> Result<()> {
        let candidate = transcript.clone();
        let id = candidate.video_id.to_string();
        *transcript = self.mutate("update", EntityKind::Transcript, &id, |ds, now| {
            ds.update_transcript(candidate, now)
        })?;
        Ok(())
    }

    /// Deletes a transcript and clears its video's `has_transcript` flag.
    pub fn delete_transcript(&self, video_id: &VideoId) -> Result<()> {
        self.mutate("delete", EntityKind::Transcript, video_id.as_str(), |ds, now| {
            ds.remove_transcript(video_id, now)
        })?;
        Ok(())
    }

    // ---- sync state ----

    pub fn get_sync_state(&self, channel_id: &ChannelId) -> Result<SyncState> {
        Ok(self.read()?.sync_state(channel_id)?.clone())
    }

    /// Inserts or replaces a channel's sync state. No existence check is made.
    pub fn update_sync_state(&self, state: &mut SyncState) -> Result<()> {
        let candidate = state.clone();
        let id = candidate.channel_id.to_string();
        *state = self.mutate("update", EntityKind::SyncState, &id, |ds, now| {
            Ok(ds.upsert_sync_state(candidate, now))
        })?;
        Ok(())
    }

    /// When the channel was last synced; `None` if it never has been.
    pub fn get_last_sync(&self, channel_id: &ChannelId) -> Result<Option<DateTime<Utc>>> {
        match self.read()?.sync_state(channel_id) {
            Ok(state) => Ok(state.last_sync_at),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ---- maintenance ----

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.read()?.stats())
    }

    /// Checks every index and the `has_transcript` flag against the collections.
    pub fn verify(&self) -> Result<IntegrityReport> {
        Ok(self.read()?.verify())
    }

    /// Re-derives all indexes from the collections and persists the result.
    pub fn rebuild_indexes(&self) -> Result<()> {
        self.mutate("rebuild", EntityKind::Dataset, "indexes", |ds, _| {
            ds.rebuild_indexes();
            Ok(())
        })?;
        info!(path = %self.config.path.display(), "Rebuilt indexes");
        Ok(())
    }
}
