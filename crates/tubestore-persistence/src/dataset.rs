//! In-memory dataset snapshot and index maintenance.
//!
//! A [`Dataset`] is the unit of persistence: four primary collections plus
//! three derived lookup tables. Every operation here keeps the indexes
//! consistent with the collections; the [`Store`](crate::Store) adds locking
//! and persistence on top.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tubestore_models::{Channel, ChannelId, SyncState, Transcript, Video, VideoId};

use crate::error::{EntityKind, Result, StoreError};

/// Schema tag written into every dataset file.
pub const SCHEMA: &str = "tubestore.dataset";

/// Current on-disk format version.
pub const CURRENT_VERSION: u32 = 1;

/// Derived lookup tables. Always re-derivable from the primary collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indexes {
    /// External channel ID to internal channel ID.
    #[serde(default)]
    pub channel_by_external_id: BTreeMap<String, ChannelId>,
    /// External video ID to internal video ID.
    #[serde(default)]
    pub video_by_external_id: BTreeMap<String, VideoId>,
    /// Channel ID to its video IDs in insertion order.
    #[serde(default)]
    pub videos_by_channel: BTreeMap<ChannelId, Vec<VideoId>>,
}

impl Indexes {
    pub fn is_empty(&self) -> bool {
        self.channel_by_external_id.is_empty()
            && self.video_by_external_id.is_empty()
            && self.videos_by_channel.is_empty()
    }

    /// Derives indexes by scanning the primary collections.
    ///
    /// Videos are listed per channel by creation time, then ID.
    pub fn rebuild(
        channels: &BTreeMap<ChannelId, Channel>,
        videos: &BTreeMap<VideoId, Video>,
    ) -> Self {
        let mut indexes = Self::default();

        for channel in channels.values() {
            indexes
                .channel_by_external_id
                .insert(channel.external_id.clone(), channel.id.clone());
            indexes.videos_by_channel.entry(channel.id.clone()).or_default();
        }

        let mut ordered: Vec<&Video> = videos.values().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        for video in ordered {
            indexes
                .video_by_external_id
                .insert(video.external_id.clone(), video.id.clone());
            indexes
                .videos_by_channel
                .entry(video.channel_id.clone())
                .or_default()
                .push(video.id.clone());
        }

        indexes
    }
}

/// Collection sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub channels: usize,
    pub videos: usize,
    pub transcripts: usize,
    pub sync_states: usize,
    pub videos_needing_transcript: usize,
}

/// Result of checking the dataset's invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// The whole persisted dataset.
///
/// Read access is public; mutation is only available through
/// [`Store`](crate::Store), which locks and persists every change.
///
/// ```compile_fail
/// use tubestore_persistence::dataset::Dataset;
///
/// let mut dataset = Dataset::new("/tmp/tubestore.json");
/// dataset.remove_channel(&"chan-1".into()).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    schema: String,
    version: u32,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    channels: BTreeMap<ChannelId, Channel>,
    #[serde(default)]
    videos: BTreeMap<VideoId, Video>,
    /// Keyed by video ID.
    #[serde(default)]
    transcripts: BTreeMap<VideoId, Transcript>,
    /// Keyed by channel ID.
    #[serde(default)]
    sync_states: BTreeMap<ChannelId, SyncState>,
    #[serde(default)]
    indexes: Indexes,
    /// File this snapshot belongs to, for error reporting.
    #[serde(skip)]
    path: PathBuf,
}

impl Dataset {
    /// Creates an empty, current-version dataset.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            schema: SCHEMA.to_string(),
            version: CURRENT_VERSION,
            updated_at: Utc::now(),
            channels: BTreeMap::new(),
            videos: BTreeMap::new(),
            transcripts: BTreeMap::new(),
            sync_states: BTreeMap::new(),
            indexes: Indexes::default(),
            path: path.into(),
        }
    }

    /// Parses a dataset file's content.
    ///
    /// Returns the dataset and whether its indexes had to be rebuilt because
    /// the file lacked one or more index tables.
    pub fn from_json(path: impl Into<PathBuf>, json: &str) -> Result<(Self, bool)> {
        let path = path.into();
        let corrupt = |e: serde_json::Error| StoreError::StorageCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(json).map_err(corrupt)?;
        let absent = absent_index_tables(&value);
        let mut dataset: Dataset = serde_json::from_value(value).map_err(corrupt)?;

        if dataset.schema != SCHEMA {
            return Err(StoreError::StorageCorrupt {
                path,
                reason: format!("unexpected schema tag '{}'", dataset.schema),
            });
        }
        if dataset.version > CURRENT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: dataset.version,
                supported: CURRENT_VERSION,
            });
        }

        dataset.path = path;
        dataset.version = CURRENT_VERSION;

        let rebuilt = dataset.needs_index_rebuild(&absent);
        if rebuilt {
            dataset.rebuild_indexes();
        }

        Ok((dataset, rebuilt))
    }

    /// True when an index table is absent, or empty while its collection is not.
    ///
    /// Populated tables are kept as loaded; dangling entries in them are
    /// corruption, not something to paper over.
    fn needs_index_rebuild(&self, absent: &[&str]) -> bool {
        let has_entities = !self.channels.is_empty() || !self.videos.is_empty();
        if !has_entities {
            return false;
        }
        !absent.is_empty()
            || (!self.channels.is_empty() && self.indexes.channel_by_external_id.is_empty())
            || (!self.videos.is_empty() && self.indexes.video_by_external_id.is_empty())
            || self.indexes.videos_by_channel.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn indexes(&self) -> &Indexes {
        &self.indexes
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Replaces the indexes with ones derived from the primary collections.
    pub(crate) fn rebuild_indexes(&mut self) {
        self.indexes = Indexes::rebuild(&self.channels, &self.videos);
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::StorageCorrupt {
            path: self.path.clone(),
            reason,
        }
    }

    // ---- channels ----

    /// Inserts a channel, assigning an ID if unassigned. Returns the stored record.
    pub(crate) fn insert_channel(&mut self, mut channel: Channel, now: DateTime<Utc>) -> Result<Channel> {
        validate_external_id(EntityKind::Channel, &channel.external_id)?;
        if channel.id.is_unassigned() {
            channel.id = ChannelId::generate();
        }
        if self.channels.contains_key(&channel.id) {
            return Err(StoreError::already_exists(EntityKind::Channel, &channel.id));
        }
        if self
            .indexes
            .channel_by_external_id
            .contains_key(&channel.external_id)
        {
            return Err(StoreError::already_exists(
                EntityKind::Channel,
                &channel.external_id,
            ));
        }

        channel.created_at = now;
        channel.updated_at = now;

        self.indexes
            .channel_by_external_id
            .insert(channel.external_id.clone(), channel.id.clone());
        self.indexes
            .videos_by_channel
            .entry(channel.id.clone())
            .or_default();
        self.channels.insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    pub fn channel(&self, id: &ChannelId) -> Result<&Channel> {
        self.channels
            .get(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Channel, id))
    }

    pub fn channel_by_external_id(&self, external_id: &str) -> Result<&Channel> {
        let id = self
            .indexes
            .channel_by_external_id
            .get(external_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Channel, external_id))?;
        self.channels.get(id).ok_or_else(|| {
            self.corrupt(format!(
                "channel index entry '{external_id}' points at missing channel {id}"
            ))
        })
    }

    /// Channels ordered by creation time.
    pub fn channels(&self) -> Vec<&Channel> {
        let mut channels: Vec<&Channel> = self.channels.values().collect();
        channels.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        channels
    }

    /// Replaces a channel, moving its external-ID index entry if it changed.
    pub(crate) fn update_channel(&mut self, mut channel: Channel, now: DateTime<Utc>) -> Result<Channel> {
        validate_external_id(EntityKind::Channel, &channel.external_id)?;
        let stored = self.channel(&channel.id)?.clone();

        if stored.external_id != channel.external_id {
            let index = &mut self.indexes.channel_by_external_id;
            if index.contains_key(&channel.external_id) {
                return Err(StoreError::already_exists(
                    EntityKind::Channel,
                    &channel.external_id,
                ));
            }
            remove_entry(index, &stored.external_id, &channel.id);
            index.insert(channel.external_id.clone(), channel.id.clone());
        }

        channel.created_at = stored.created_at;
        channel.updated_at = now;
        self.channels.insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    /// Removes a channel with its videos, their transcripts and its sync state.
    ///
    /// Returns the removed channel and the number of videos removed with it.
    pub(crate) fn remove_channel(&mut self, id: &ChannelId) -> Result<(Channel, usize)> {
        let channel = self
            .channels
            .remove(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Channel, id))?;
        remove_entry(
            &mut self.indexes.channel_by_external_id,
            &channel.external_id,
            id,
        );

        // Scan as well as consult the index so no video is orphaned.
        let mut owned: Vec<VideoId> = self
            .indexes
            .videos_by_channel
            .remove(id)
            .unwrap_or_default();
        owned.extend(
            self.videos
                .values()
                .filter(|v| &v.channel_id == id)
                .map(|v| v.id.clone()),
        );

        let mut removed = 0;
        for video_id in owned {
            if let Some(video) = self.videos.remove(&video_id) {
                remove_entry(
                    &mut self.indexes.video_by_external_id,
                    &video.external_id,
                    &video_id,
                );
                removed += 1;
            }
            self.transcripts.remove(&video_id);
        }

        self.sync_states.remove(id);
        Ok((channel, removed))
    }

    // ---- videos ----

    /// Inserts a video under an existing channel. Returns the stored record.
    pub(crate) fn insert_video(&mut self, mut video: Video, now: DateTime<Utc>) -> Result<Video> {
        validate_external_id(EntityKind::Video, &video.external_id)?;
        if video.id.is_unassigned() {
            video.id = VideoId::generate();
        }
        if self.videos.contains_key(&video.id) {
            return Err(StoreError::already_exists(EntityKind::Video, &video.id));
        }
        if self
            .indexes
            .video_by_external_id
            .contains_key(&video.external_id)
        {
            return Err(StoreError::already_exists(
                EntityKind::Video,
                &video.external_id,
            ));
        }
        self.channel(&video.channel_id)?;

        video.has_transcript = self.transcripts.contains_key(&video.id);
        video.created_at = now;
        video.updated_at = now;

        self.indexes
            .video_by_external_id
            .insert(video.external_id.clone(), video.id.clone());
        self.indexes
            .videos_by_channel
            .entry(video.channel_id.clone())
            .or_default()
            .push(video.id.clone());
        self.videos.insert(video.id.clone(), video.clone());
        Ok(video)
    }

    pub fn video(&self, id: &VideoId) -> Result<&Video> {
        self.videos
            .get(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Video, id))
    }

    pub fn video_by_external_id(&self, external_id: &str) -> Result<&Video> {
        let id = self
            .indexes
            .video_by_external_id
            .get(external_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Video, external_id))?;
        self.videos.get(id).ok_or_else(|| {
            self.corrupt(format!(
                "video index entry '{external_id}' points at missing video {id}"
            ))
        })
    }

    /// All videos ordered by creation time.
    pub fn videos(&self) -> Vec<&Video> {
        let mut videos: Vec<&Video> = self.videos.values().collect();
        videos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        videos
    }

    /// A channel's videos in insertion order. Unknown channels have none.
    pub fn videos_by_channel(&self, channel_id: &ChannelId) -> Result<Vec<&Video>> {
        let Some(ids) = self.indexes.videos_by_channel.get(channel_id) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                self.videos.get(id).ok_or_else(|| {
                    self.corrupt(format!(
                        "channel {channel_id} lists missing video {id}"
                    ))
                })
            })
            .collect()
    }

    /// Videos without a stored transcript, ordered by creation time.
    pub fn videos_needing_transcript(&self) -> Vec<&Video> {
        self.videos()
            .into_iter()
            .filter(|v| !v.has_transcript)
            .collect()
    }

    /// Replaces a video, repairing the external-ID and channel indexes.
    ///
    /// `has_transcript` and `created_at` are kept from the stored record.
    pub(crate) fn update_video(&mut self, mut video: Video, now: DateTime<Utc>) -> Result<Video> {
        validate_external_id(EntityKind::Video, &video.external_id)?;
        let stored = self.video(&video.id)?.clone();

        if stored.channel_id != video.channel_id {
            self.channel(&video.channel_id)?;
        }

        if stored.external_id != video.external_id {
            let index = &mut self.indexes.video_by_external_id;
            if index.contains_key(&video.external_id) {
                return Err(StoreError::already_exists(
                    EntityKind::Video,
                    &video.external_id,
                ));
            }
            remove_entry(index, &stored.external_id, &video.id);
            index.insert(video.external_id.clone(), video.id.clone());
        }

        if stored.channel_id != video.channel_id {
            if let Some(ids) = self.indexes.videos_by_channel.get_mut(&stored.channel_id) {
                ids.retain(|id| id != &video.id);
            }
            self.indexes
                .videos_by_channel
                .entry(video.channel_id.clone())
                .or_default()
                .push(video.id.clone());
        }

        video.has_transcript = stored.has_transcript;
        video.created_at = stored.created_at;
        video.updated_at = now;
        self.videos.insert(video.id.clone(), video.clone());
        Ok(video)
    }

    /// Removes a video and its transcript. Sync state is not touched.
    pub(crate) fn remove_video(&mut self, id: &VideoId) -> Result<Video> {
        let video = self
            .videos
            .remove(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Video, id))?;

        remove_entry(
            &mut self.indexes.video_by_external_id,
            &video.external_id,
            id,
        );
        if let Some(ids) = self.indexes.videos_by_channel.get_mut(&video.channel_id) {
            ids.retain(|v| v != id);
        }
        self.transcripts.remove(id);
        Ok(video)
    }

    // ---- transcripts ----

    /// Stores a transcript for an existing video and flags the video.
    pub(crate) fn insert_transcript(
        &mut self,
        mut transcript: Transcript,
        now: DateTime<Utc>,
    ) -> Result<Transcript> {
        if self.transcripts.contains_key(&transcript.video_id) {
            return Err(StoreError::already_exists(
                EntityKind::Transcript,
                &transcript.video_id,
            ));
        }
        let video = self
            .videos
            .get_mut(&transcript.video_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Video, &transcript.video_id))?;
        video.has_transcript = true;
        video.updated_at = now;

        transcript.created_at = now;
        transcript.updated_at = now;
        self.transcripts
            .insert(transcript.video_id.clone(), transcript.clone());
        Ok(transcript)
    }

    pub fn transcript(&self, video_id: &VideoId) -> Result<&Transcript> {
        self.transcripts
            .get(video_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Transcript, video_id))
    }

    /// Transcripts of a channel's videos, in the channel's video order.
    pub fn transcripts_by_channel(&self, channel_id: &ChannelId) -> Vec<&Transcript> {
        self.indexes
            .videos_by_channel
            .get(channel_id)
            .map(|ids| ids.iter().filter_map(|id| self.transcripts.get(id)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn update_transcript(
        &mut self,
        mut transcript: Transcript,
        now: DateTime<Utc>,
    ) -> Result<Transcript> {
        let stored = self.transcript(&transcript.video_id)?;
        transcript.created_at = stored.created_at;
        transcript.updated_at = now;
        self.transcripts
            .insert(transcript.video_id.clone(), transcript.clone());
        Ok(transcript)
    }

    /// Removes a transcript and clears the video's flag.
    pub(crate) fn remove_transcript(&mut self, video_id: &VideoId, now: DateTime<Utc>) -> Result<Transcript> {
        let transcript = self
            .transcripts
            .remove(video_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Transcript, video_id))?;
        if let Some(video) = self.videos.get_mut(video_id) {
            video.has_transcript = false;
            video.updated_at = now;
        }
        Ok(transcript)
    }

    // ---- sync state ----

    pub fn sync_state(&self, channel_id: &ChannelId) -> Result<&SyncState> {
        self.sync_states
            .get(channel_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::SyncState, channel_id))
    }

    /// Inserts or replaces a channel's sync state.
    pub(crate) fn upsert_sync_state(&mut self, mut state: SyncState, now: DateTime<Utc>) -> SyncState {
        state.updated_at = now;
        self.sync_states
            .insert(state.channel_id.clone(), state.clone());
        state
    }

    // ---- diagnostics ----

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            channels: self.channels.len(),
            videos: self.videos.len(),
            transcripts: self.transcripts.len(),
            sync_states: self.sync_states.len(),
            videos_needing_transcript: self.videos.values().filter(|v| !v.has_transcript).count(),
        }
    }

    /// Checks that indexes and the transcript flag agree with the collections.
    pub fn verify(&self) -> IntegrityReport {
        let mut issues = Vec::new();

        for (external_id, id) in &self.indexes.channel_by_external_id {
            match self.channels.get(id) {
                None => issues.push(format!(
                    "channel index '{external_id}' points at missing channel {id}"
                )),
                Some(c) if &c.external_id != external_id => issues.push(format!(
                    "channel index '{external_id}' points at channel {id} with external id '{}'",
                    c.external_id
                )),
                Some(_) => {}
            }
        }
        for channel in self.channels.values() {
            if self.indexes.channel_by_external_id.get(&channel.external_id) != Some(&channel.id) {
                issues.push(format!("channel {} is not indexed by external id", channel.id));
            }
        }

        for (external_id, id) in &self.indexes.video_by_external_id {
            match self.videos.get(id) {
                None => issues.push(format!(
                    "video index '{external_id}' points at missing video {id}"
                )),
                Some(v) if &v.external_id != external_id => issues.push(format!(
                    "video index '{external_id}' points at video {id} with external id '{}'",
                    v.external_id
                )),
                Some(_) => {}
            }
        }

        let mut listed = HashSet::new();
        for (channel_id, ids) in &self.indexes.videos_by_channel {
            if !self.channels.contains_key(channel_id) {
                issues.push(format!("video list kept for missing channel {channel_id}"));
            }
            for id in ids {
                if !listed.insert(id) {
                    issues.push(format!("video {id} listed more than once"));
                }
                match self.videos.get(id) {
                    None => issues.push(format!("channel {channel_id} lists missing video {id}")),
                    Some(v) if &v.channel_id != channel_id => issues.push(format!(
                        "channel {channel_id} lists video {id} owned by {}",
                        v.channel_id
                    )),
                    Some(_) => {}
                }
            }
        }

        for video in self.videos.values() {
            if self.indexes.video_by_external_id.get(&video.external_id) != Some(&video.id) {
                issues.push(format!("video {} is not indexed by external id", video.id));
            }
            if !listed.contains(&video.id) {
                issues.push(format!("video {} missing from its channel list", video.id));
            }
            if !self.channels.contains_key(&video.channel_id) {
                issues.push(format!(
                    "video {} belongs to missing channel {}",
                    video.id, video.channel_id
                ));
            }
            if video.has_transcript != self.transcripts.contains_key(&video.id) {
                issues.push(format!(
                    "video {} has_transcript={} disagrees with transcripts",
                    video.id, video.has_transcript
                ));
            }
        }

        for video_id in self.transcripts.keys() {
            if !self.videos.contains_key(video_id) {
                issues.push(format!("transcript kept for missing video {video_id}"));
            }
        }

        IntegrityReport { issues }
    }
}

const INDEX_TABLES: [&str; 3] = [
    "channel_by_external_id",
    "video_by_external_id",
    "videos_by_channel",
];

/// Index tables missing from a raw dataset document.
fn absent_index_tables(value: &serde_json::Value) -> Vec<&'static str> {
    let indexes = value.get("indexes").and_then(|v| v.as_object());
    INDEX_TABLES
        .into_iter()
        .filter(|table| indexes.is_none_or(|map| !map.contains_key(*table)))
        .collect()
}

fn validate_external_id(kind: EntityKind, external_id: &str) -> Result<()> {
    if external_id.trim().is_empty() {
        return Err(StoreError::InvalidData(format!(
            "{kind} external id must not be empty"
        )));
    }
    Ok(())
}

/// Removes `key` only if it still maps to `id`.
fn remove_entry<I: PartialEq>(index: &mut BTreeMap<String, I>, key: &str, id: &I) {
    if index.get(key) == Some(id) {
        index.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dataset() -> Dataset {
        Dataset::new("/tmp/test.json")
    }

    fn seeded() -> (Dataset, Channel, Video) {
        let mut ds = dataset();
        let now = Utc::now();
        let channel = ds.insert_channel(Channel::new("UCabc", "Test"), now).unwrap();
        let video = ds
            .insert_video(Video::new("vid1", channel.id.clone()), now)
            .unwrap();
        (ds, channel, video)
    }

    #[test]
    fn test_insert_assigns_ids_and_indexes() {
        let (ds, channel, video) = seeded();

        assert!(!channel.id.is_unassigned());
        assert!(!video.id.is_unassigned());
        assert_eq!(ds.channel_by_external_id("UCabc").unwrap().id, channel.id);
        assert_eq!(ds.video_by_external_id("vid1").unwrap().id, video.id);
        assert_eq!(
            ds.indexes().videos_by_channel.get(&channel.id),
            Some(&vec![video.id.clone()])
        );
        assert!(ds.verify().is_ok());
    }

    #[test]
    fn test_insert_video_requires_channel() {
        let mut ds = dataset();
        let err = ds
            .insert_video(Video::new("vid1", "missing"), Utc::now())
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Channel, .. }));
        assert!(ds.indexes().video_by_external_id.is_empty());
    }

    #[test]
    fn test_empty_external_id_rejected() {
        let mut ds = dataset();
        let err = ds.insert_channel(Channel::new("  ", "Blank"), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn test_update_video_moves_external_id_and_channel() {
        let (mut ds, channel, mut video) = seeded();
        let other = ds
            .insert_channel(Channel::new("UCother", "Other"), Utc::now())
            .unwrap();

        video.external_id = "vid1-renamed".to_string();
        video.channel_id = other.id.clone();
        ds.update_video(video.clone(), Utc::now()).unwrap();

        assert!(ds.video_by_external_id("vid1").unwrap_err().is_not_found());
        assert_eq!(ds.video_by_external_id("vid1-renamed").unwrap().id, video.id);
        assert!(ds.videos_by_channel(&channel.id).unwrap().is_empty());
        assert_eq!(ds.videos_by_channel(&other.id).unwrap().len(), 1);
        assert!(ds.verify().is_ok());
    }

    #[test]
    fn test_update_video_keeps_store_owned_fields() {
        let (mut ds, _channel, video) = seeded();
        ds.insert_transcript(Transcript::new(video.id.clone(), "en", "hi"), Utc::now())
            .unwrap();

        let mut edited = video.clone();
        edited.has_transcript = false;
        edited.created_at = video.created_at - Duration::days(30);
        let stored = ds.update_video(edited, Utc::now()).unwrap();

        assert!(stored.has_transcript);
        assert_eq!(stored.created_at, video.created_at);
    }

    #[test]
    fn test_update_channel_external_id_collision() {
        let (mut ds, mut channel, _video) = seeded();
        ds.insert_channel(Channel::new("UCtaken", "Taken"), Utc::now())
            .unwrap();

        channel.external_id = "UCtaken".to_string();
        let err = ds.update_channel(channel, Utc::now()).unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert!(ds.verify().is_ok());
    }

    #[test]
    fn test_remove_channel_cascades() {
        let (mut ds, channel, video) = seeded();
        ds.insert_transcript(Transcript::new(video.id.clone(), "en", "hi"), Utc::now())
            .unwrap();
        ds.upsert_sync_state(SyncState::new(channel.id.clone()), Utc::now());

        let (_, removed) = ds.remove_channel(&channel.id).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(ds.stats(), StoreStats::default());
        assert!(ds.indexes().is_empty());
        assert!(ds.verify().is_ok());
    }

    #[test]
    fn test_remove_video_keeps_sync_state() {
        let (mut ds, channel, video) = seeded();
        ds.upsert_sync_state(SyncState::new(channel.id.clone()), Utc::now());

        ds.remove_video(&video.id).unwrap();

        assert!(ds.sync_state(&channel.id).is_ok());
        assert!(ds.videos_by_channel(&channel.id).unwrap().is_empty());
        assert!(ds.verify().is_ok());
    }

    #[test]
    fn test_dangling_index_is_corruption() {
        let (mut ds, _channel, video) = seeded();
        ds.videos.remove(&video.id);

        let err = ds.video_by_external_id("vid1").unwrap_err();
        assert!(matches!(err, StoreError::StorageCorrupt { .. }));
        assert!(!ds.verify().is_ok());
    }

    #[test]
    fn test_rebuild_matches_incremental_indexes() {
        let (mut ds, channel, _video) = seeded();
        let later = Utc::now() + Duration::seconds(1);
        ds.insert_video(Video::new("vid2", channel.id.clone()), later)
            .unwrap();
        let incremental = ds.indexes().clone();

        ds.rebuild_indexes();

        assert_eq!(ds.indexes(), &incremental);
    }

    #[test]
    fn test_from_json_rebuilds_missing_indexes() {
        let (ds, channel, video) = seeded();
        let mut value = serde_json::to_value(&ds).unwrap();
        value.as_object_mut().unwrap().remove("indexes");

        let (loaded, rebuilt) = Dataset::from_json("/tmp/test.json", &value.to_string()).unwrap();

        assert!(rebuilt);
        assert_eq!(loaded.channel_by_external_id("UCabc").unwrap().id, channel.id);
        assert_eq!(loaded.video_by_external_id("vid1").unwrap().id, video.id);
    }

    #[test]
    fn test_from_json_rebuilds_single_missing_table() {
        let (ds, _channel, video) = seeded();
        let mut value = serde_json::to_value(&ds).unwrap();
        value["indexes"]
            .as_object_mut()
            .unwrap()
            .remove("video_by_external_id");

        let (mut loaded, rebuilt) =
            Dataset::from_json("/tmp/test.json", &value.to_string()).unwrap();

        assert!(rebuilt);
        assert_eq!(loaded.video_by_external_id("vid1").unwrap().id, video.id);
        assert!(loaded.verify().is_ok());

        let err = loaded
            .insert_video(Video::new("vid1", video.channel_id.clone()), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[test]
    fn test_from_json_keeps_complete_indexes() {
        let (ds, _channel, _video) = seeded();
        let json = serde_json::to_string(&ds).unwrap();

        let (loaded, rebuilt) = Dataset::from_json("/tmp/test.json", &json).unwrap();

        assert!(!rebuilt);
        assert_eq!(loaded.indexes(), ds.indexes());
    }

    #[test]
    fn test_from_json_rejects_newer_version() {
        let mut value = serde_json::to_value(dataset()).unwrap();
        value["version"] = serde_json::json!(CURRENT_VERSION + 1);

        let err = Dataset::from_json("/tmp/test.json", &value.to_string()).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = Dataset::from_json("/tmp/test.json", "{\"channels\": [").unwrap_err();
        assert!(matches!(err, StoreError::StorageCorrupt { .. }));
    }
}
