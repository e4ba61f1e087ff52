use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::cache::{Location, PhotoFeed, PhotoRecord};
use crate::sources::PhotoLibrary;

/// Record shape handed to the frame's web layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoResponse {
    pub id: String,
    pub date: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl PhotoResponse {
    fn from_record(record: PhotoRecord, city: String) -> Self {
        Self {
            index: record.sequence_index(),
            total: record.cycle_total(),
            date: record.display_date().to_string(),
            id: record.id().to_string(),
            city,
        }
    }
}

/// Entry point for whatever serves the frame.
///
/// Dispatches from the configured feed and completes the record: a location
/// the feed could not know is looked up once, right after dispatch, on the
/// caller's own copy.
pub struct PhotoService {
    feed: Arc<dyn PhotoFeed>,
    library: Arc<dyn PhotoLibrary>,
}

impl PhotoService {
    pub fn new(feed: Arc<dyn PhotoFeed>, library: Arc<dyn PhotoLibrary>) -> Self {
        Self { feed, library }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.feed.strategy_name()
    }

    /// Next photo, or `None` while the feed has nothing ready.
    pub async fn next_photo(&self) -> Option<PhotoResponse> {
        let record = self.feed.next().await?;
        Some(self.complete(record).await)
    }

    /// Up to `count` photos in dispatch order. Stops early when the feed
    /// runs dry; locations are looked up concurrently.
    #[allow(dead_code)]
    pub async fn batch(&self, count: usize) -> Vec<PhotoResponse> {
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            match self.feed.next().await {
                Some(record) => records.push(record),
                None => break,
            }
        }

        join_all(records.into_iter().map(|record| self.complete(record))).await
    }

    async fn complete(&self, record: PhotoRecord) -> PhotoResponse {
        let city = match record.location() {
            Location::Resolved(location) => location.clone(),
            Location::Unresolved => match self.library.asset_location(record.id()).await {
                Ok(location) => location,
                Err(e) => {
                    warn!("City fetch error for {} ({}): {}", record.id(), e.endpoint(), e);
                    String::new()
                }
            },
        };

        PhotoResponse::from_record(record, city)
    }
}
