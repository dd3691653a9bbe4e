//! Transcript entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::VideoId;

/// Transcript text for a single video. Keyed by the video's internal ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: VideoId,

    /// Language code, e.g. `en`.
    pub language: String,

    /// Plain text content.
    pub content: String,

    /// Where the text came from, e.g. `auto` or `manual` captions.
    #[serde(default)]
    pub source: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    pub fn new(
        video_id: impl Into<VideoId>,
        language: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            video_id: video_id.into(),
            language: language.into(),
            content: content.into(),
            source: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}
