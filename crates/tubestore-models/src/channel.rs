//! Channel entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ChannelId;

/// A tracked YouTube channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Internal ID, assigned by the store when unassigned.
    pub id: ChannelId,

    /// Platform channel ID (e.g. `UC...`). Unique across channels.
    pub external_id: String,

    /// Display name.
    pub name: String,

    /// Channel URL.
    #[serde(default)]
    pub url: String,

    /// Stamped by the store on create.
    pub created_at: DateTime<Utc>,

    /// Stamped by the store on create and update.
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Creates an unsaved channel with an unassigned ID.
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ChannelId::default(),
            external_id: external_id.into(),
            name: name.into(),
            url: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the channel URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Uses a caller-chosen internal ID instead of a generated one.
    pub fn with_id(mut self, id: impl Into<ChannelId>) -> Self {
        self.id = id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_channel_is_unassigned() {
        let channel = Channel::new("UCabc", "Test").with_url("https://youtube.com/@test");
        assert!(channel.id.is_unassigned());
        assert_eq!(channel.external_id, "UCabc");
        assert_eq!(channel.url, "https://youtube.com/@test");
    }
}
