//! Persistence layer for tubestore.
//!
//! A single JSON file holds every channel, video, transcript and sync
//! checkpoint together with the lookup indexes derived from them. The file
//! is guarded by an advisory lock on a `.lock` sidecar for as long as a
//! [`Store`] is open, and is rewritten atomically (write to temp file, then
//! rename) after every successful mutation.
//!
//! # Example
//!
//! ```no_run
//! use tubestore_models::{Channel, Transcript, Video};
//! use tubestore_persistence::{Store, StoreConfig};
//! use std::time::Duration;
//!
//! let config = StoreConfig::new("/home/user/.tubestore/tubestore.json")
//!     .with_lock_timeout(Duration::from_secs(2));
//! let store = Store::open(config).unwrap();
//!
//! let mut channel = Channel::new("UCabc", "Test");
//! store.create_channel(&mut channel).unwrap();
//!
//! let mut video = Video::new("vid1", channel.id.clone());
//! store.create_video(&mut video).unwrap();
//!
//! let mut transcript = Transcript::new(video.id.clone(), "en", "hello");
//! store.create_transcript(&mut transcript).unwrap();
//!
//! assert!(store.get_video(&video.id).unwrap().has_transcript);
//! ```

pub mod atomic;
pub mod config;
pub mod dataset;
pub mod error;
pub mod lock;
pub mod store;

pub use atomic::AtomicWriter;
pub use config::{default_data_path, StoreConfig};
pub use dataset::{IntegrityReport, StoreStats};
pub use error::{EntityKind, ErrorKind, Result, StoreError};
pub use lock::FileLock;
pub use store::Store;
