use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{PhotoFeed, PhotoRecord};
use crate::format::format_date;
use crate::sources::PhotoLibrary;

/// Random-asset calls per `next()` before reporting "not ready".
pub const MAX_RANDOM_ATTEMPTS: usize = 5;

/// Picks photos straight from the library's random endpoint.
///
/// No memory of what was shown: uniqueness is left to the randomness of the
/// upstream. Random assets carry EXIF data, so records come out with their
/// location already resolved.
pub struct RandomAssetPicker {
    library: Arc<dyn PhotoLibrary>,
    lock: Mutex<()>,
}

impl RandomAssetPicker {
    pub fn new(library: Arc<dyn PhotoLibrary>) -> Self {
        Self {
            library,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PhotoFeed for RandomAssetPicker {
    async fn next(&self) -> Option<PhotoRecord> {
        let _guard = self.lock.lock().await;

        for attempt in 1..=MAX_RANDOM_ATTEMPTS {
            let asset = match self.library.random_asset().await {
                Ok(Some(asset)) => asset,
                Ok(None) => {
                    debug!("Attempt {}: random endpoint returned nothing", attempt);
                    continue;
                }
                Err(e) => {
                    debug!("Attempt {}: random asset failed: {}", attempt, e);
                    continue;
                }
            };

            if !asset.is_usable() {
                debug!("Attempt {}: skipping {} ({})", attempt, asset.id, asset.asset_type);
                continue;
            }

            let location = asset.location();
            return Some(
                PhotoRecord::new(asset.id, format_date(&asset.file_created_at)).with_location(location),
            );
        }

        warn!("⚠️ No usable random photo after {} attempts", MAX_RANDOM_ATTEMPTS);
        None
    }

    fn strategy_name(&self) -> &'static str {
        "random-asset"
    }
}
