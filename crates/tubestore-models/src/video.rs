//! Video entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, VideoId};

/// A video belonging to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Internal ID, assigned by the store when unassigned.
    pub id: VideoId,

    /// Platform video ID. Unique across videos.
    pub external_id: String,

    /// Owning channel.
    pub channel_id: ChannelId,

    /// Video title.
    #[serde(default)]
    pub title: String,

    /// Whether a transcript is stored for this video.
    ///
    /// Maintained by the store; any value supplied on create or update is ignored.
    #[serde(default)]
    pub has_transcript: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Creates an unsaved video with an unassigned ID.
    pub fn new(external_id: impl Into<String>, channel_id: impl Into<ChannelId>) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::default(),
            external_id: external_id.into(),
            channel_id: channel_id.into(),
            title: String::new(),
            has_transcript: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Uses a caller-chosen internal ID instead of a generated one.
    pub fn with_id(mut self, id: impl Into<VideoId>) -> Self {
        self.id = id.into();
        self
    }
}
