//! Entity types for the tubestore dataset.
//!
//! Four linked collections: channels, their videos, one transcript per
//! video, and one sync checkpoint per channel.

pub mod channel;
pub mod ids;
pub mod sync_state;
pub mod transcript;
pub mod video;

pub use channel::Channel;
pub use ids::{ChannelId, VideoId};
pub use sync_state::{SyncState, SyncStatus};
pub use transcript::Transcript;
pub use video::Video;
