//! # Cache Module
//!
//! Photo feeds for the frame: the logic that decides which photo is shown
//! next and keeps repeats away until the collection has been exhausted.
//!
//! Every strategy implements [`PhotoFeed`]: "deliver the next unseen item,
//! recycle the universe when exhausted". A feed returns `None` when nothing
//! is ready yet; that is a "try again later" signal, never an error.
//!
//! ## Strategies
//!
//! - **[`sampling::SamplingCache`]**: random-page sampler for libraries too
//!   large to enumerate. Pulls one photo from a random search page per
//!   replenish and remembers shown ids until a full cycle has gone by.
//! - **[`shuffle::ShuffleCache`]**: bounded album loaded in full, shuffled
//!   locally and reshuffled on every pass. Refreshed in the background.
//! - **[`random_asset::RandomAssetPicker`]**: asks the library's random
//!   endpoint directly, a few attempts per call.
//!
//! ## Concurrency
//!
//! Each feed is a single shared resource behind one exclusive lock. For the
//! sampler that lock also covers the network round trips of a replenish, so
//! concurrent callers wait for one replenish instead of racing their own.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! # use std::sync::Arc;
//! use crate::cache::{PhotoFeed, SamplingCache};
//! use crate::sources::PhotoLibrary;
//!
//! # async fn example(library: Arc<dyn PhotoLibrary>) {
//! let feed = SamplingCache::new(library, 85_000);
//!
//! if let Some(photo) = feed.next().await {
//!     println!("showing {} from {}", photo.id(), photo.display_date());
//! }
//! # }
//! ```

pub mod random_asset;
pub mod sampling;
pub mod shuffle;

use async_trait::async_trait;

pub use random_asset::RandomAssetPicker;
pub use sampling::SamplingCache;
pub use shuffle::ShuffleCache;

/// Common contract of every photo strategy.
#[async_trait]
pub trait PhotoFeed: Send + Sync {
    /// Next photo to show, or `None` when nothing is available right now.
    async fn next(&self) -> Option<PhotoRecord>;

    fn strategy_name(&self) -> &'static str;
}

/// Location of a photo as far as the feed knows it.
///
/// Search results carry no EXIF data, so sampled records start out
/// `Unresolved` and the service looks the location up once after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Unresolved,
    Resolved(String),
}

impl Location {
    #[allow(dead_code)]
    pub fn as_resolved(&self) -> Option<&str> {
        match self {
            Self::Resolved(location) => Some(location),
            Self::Unresolved => None,
        }
    }
}

/// Lightweight metadata for one photo. Bytes are never held here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    id: String,
    display_date: String,
    location: Location,
    sequence_index: Option<usize>,
    cycle_total: Option<usize>,
}

impl PhotoRecord {
    pub fn new(id: impl Into<String>, display_date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_date: display_date.into(),
            location: Location::Unresolved,
            sequence_index: None,
            cycle_total: None,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn display_date(&self) -> &str {
        &self.display_date
    }
    pub fn location(&self) -> &Location {
        &self.location
    }
    pub fn sequence_index(&self) -> Option<usize> {
        self.sequence_index
    }
    pub fn cycle_total(&self) -> Option<usize> {
        self.cycle_total
    }

    // Builders
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Location::Resolved(location.into());
        self
    }

    /// 1-based position within a cycle of `total` photos.
    pub fn with_position(mut self, index: usize, total: usize) -> Self {
        self.sequence_index = Some(index);
        self.cycle_total = Some(total);
        self
    }
}
