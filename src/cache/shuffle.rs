use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PhotoFeed, PhotoRecord};
use crate::error::LibraryError;
use crate::format::format_date;
use crate::sources::{Asset, PhotoLibrary};

/// Delay between attempts of the initial album load.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default period of the background album refresh.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shuffled album plus the cursor into it. Replaced as one value on refresh.
#[derive(Debug, Default)]
struct ShuffledSequence {
    records: Vec<PhotoRecord>,
    cursor: usize,
    passes: u64,
}

/// Bounded-album shuffler.
///
/// Holds the whole album in memory, serves it in shuffled order and
/// reshuffles once every photo has been shown. A failed refresh keeps the
/// previous sequence in service.
pub struct ShuffleCache {
    library: Arc<dyn PhotoLibrary>,
    album_id: String,
    sequence: Mutex<ShuffledSequence>,
    rng: Mutex<StdRng>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ShuffleCache {
    pub fn new(library: Arc<dyn PhotoLibrary>, album_id: impl Into<String>) -> Self {
        Self {
            library,
            album_id: album_id.into(),
            sequence: Mutex::new(ShuffledSequence::default()),
            rng: Mutex::new(StdRng::from_entropy()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    #[allow(dead_code)]
    pub fn with_rng_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn album_id(&self) -> &str {
        &self.album_id
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.sequence.lock().records.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(cursor, len)` of the sequence currently in service.
    #[allow(dead_code)]
    pub fn position(&self) -> (usize, usize) {
        let sequence = self.sequence.lock();
        (sequence.cursor, sequence.records.len())
    }

    /// Reloads the album and swaps in a freshly shuffled sequence.
    ///
    /// The album is fetched without holding the sequence lock, so `next()`
    /// keeps serving the previous sequence meanwhile. Concurrent refreshes
    /// are serialized. Returns the number of photos now in service.
    pub async fn refresh(&self) -> Result<usize, LibraryError> {
        let _gate = self.refresh_gate.lock().await;

        let assets = self.library.fetch_album(&self.album_id).await?;
        let fetched = assets.len();

        let usable: Vec<Asset> = assets.into_iter().filter(Asset::is_usable).collect();
        let total = usable.len();

        let mut records: Vec<PhotoRecord> = usable
            .into_iter()
            .enumerate()
            .map(|(index, asset)| {
                let location = asset.location();
                PhotoRecord::new(asset.id, format_date(&asset.file_created_at))
                    .with_location(location)
                    .with_position(index + 1, total)
            })
            .collect();

        records.shuffle(&mut *self.rng.lock());

        *self.sequence.lock() = ShuffledSequence {
            records,
            cursor: 0,
            passes: 0,
        };

        info!(
            "📚 Album {} loaded: {} photos ({} assets fetched)",
            self.album_id, total, fetched
        );
        Ok(total)
    }

    #[cfg(test)]
    fn order(&self) -> Vec<String> {
        self.sequence
            .lock()
            .records
            .iter()
            .map(|record| record.id().to_string())
            .collect()
    }

    #[cfg(test)]
    fn passes(&self) -> u64 {
        self.sequence.lock().passes
    }
}

#[async_trait]
impl PhotoFeed for ShuffleCache {
    async fn next(&self) -> Option<PhotoRecord> {
        let mut sequence = self.sequence.lock();

        if sequence.records.is_empty() {
            return None;
        }

        if sequence.cursor >= sequence.records.len() {
            sequence.records.shuffle(&mut *self.rng.lock());
            sequence.cursor = 0;
            sequence.passes += 1;
            debug!("🔀 Pass {} over {} photos, reshuffled", sequence.passes, sequence.records.len());
        }

        let record = sequence.records[sequence.cursor].clone();
        sequence.cursor += 1;
        Some(record)
    }

    fn strategy_name(&self) -> &'static str {
        "album"
    }
}

/// Loads the album and keeps it fresh until `cancel` fires.
///
/// The initial load is retried every [`INITIAL_RETRY_DELAY`] until it
/// succeeds. After that the album is refreshed every `every`; a failed
/// refresh is logged and the previous sequence stays in service. Running
/// everything on one task keeps refreshes from overlapping.
pub fn spawn_refresh_task(
    cache: Arc<ShuffleCache>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match cache.refresh().await {
                Ok(count) => {
                    info!("✅ Initial album load complete: {} photos", count);
                    break;
                }
                Err(e) => {
                    warn!(
                        "❌ Initial album load failed, retrying in {:?}: {}",
                        INITIAL_RETRY_DELAY, e
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(INITIAL_RETRY_DELAY) => {}
            }
        }

        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Album refresh task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match cache.refresh().await {
                        Ok(count) => debug!("Album refreshed: {} photos", count),
                        Err(e) => warn!("⚠️ Album refresh failed, keeping previous sequence: {}", e),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Location;
    use crate::sources::testing::{image_asset, status_error, FakeLibrary};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn album(ids: &[&str]) -> Vec<Asset> {
        ids.iter().map(|id| image_asset(id, "Paris", "France")).collect()
    }

    async fn loaded(ids: &[&str]) -> ShuffleCache {
        let library = Arc::new(FakeLibrary::new().with_album_response(Ok(album(ids))));
        let cache = ShuffleCache::new(library, "family").with_rng_seed(11);
        assert_eq!(cache.refresh().await.unwrap(), ids.len());
        cache
    }

    #[tokio::test]
    async fn test_empty_cache_returns_none() {
        let cache = ShuffleCache::new(Arc::new(FakeLibrary::new()), "family");
        assert!(cache.next().await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_one_pass_covers_album_exactly_once() {
        let ids = ["a", "b", "c", "d", "e", "f", "g"];
        let cache = loaded(&ids).await;

        let mut served = Vec::new();
        for _ in 0..ids.len() {
            served.push(cache.next().await.unwrap().id().to_string());
        }

        let unique: HashSet<_> = served.iter().cloned().collect();
        let expected: HashSet<_> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(served.len(), unique.len());
        assert_eq!(unique, expected);
    }

    #[tokio::test]
    async fn test_refresh_filters_and_numbers_in_source_order() {
        let mut assets = album(&["a", "b"]);
        let mut video = image_asset("v", "", "");
        video.asset_type = "VIDEO".to_string();
        let mut shot = image_asset("s", "", "");
        shot.original_file_name = "Screenshot_2024.png".to_string();
        assets.insert(1, video);
        assets.push(shot);
        assets.push(image_asset("c", "", "Japan"));

        let library = Arc::new(FakeLibrary::new().with_album_response(Ok(assets)));
        let cache = ShuffleCache::new(library, "family");
        assert_eq!(cache.refresh().await.unwrap(), 3);

        let mut records = Vec::new();
        for _ in 0..3 {
            records.push(cache.next().await.unwrap());
        }
        records.sort_by_key(|record| record.sequence_index());

        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.id(), r.sequence_index(), r.cycle_total(), r.location().clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a", Some(1), Some(3), Location::Resolved("Paris, France".into())),
                ("b", Some(2), Some(3), Location::Resolved("Paris, France".into())),
                ("c", Some(3), Some(3), Location::Resolved("Japan".into())),
            ]
        );
        assert_eq!(records[0].display_date(), "4 Mayıs 2023");
    }

    #[tokio::test]
    async fn test_exhaustion_reshuffles_once_and_restarts_at_zero() {
        let ids = ["a", "b", "c", "d", "e"];
        let cache = loaded(&ids).await;

        for _ in 0..ids.len() {
            cache.next().await.unwrap();
        }
        assert_eq!(cache.position(), (ids.len(), ids.len()));
        assert_eq!(cache.passes(), 0);

        let record = cache.next().await.unwrap();
        assert_eq!(cache.passes(), 1);
        assert_eq!(cache.position(), (1, ids.len()));
        assert_eq!(record.id(), cache.order()[0]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_sequence_and_cursor() {
        let library = Arc::new(
            FakeLibrary::new()
                .with_album_response(Ok(album(&["a", "b", "c"])))
                .with_album_response(Err(status_error("albums"))),
        );
        let cache = ShuffleCache::new(library, "family");
        cache.refresh().await.unwrap();
        cache.next().await.unwrap();

        let order_before = cache.order();
        let position_before = cache.position();

        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.order(), order_before);
        assert_eq!(cache.position(), position_before);
        assert_eq!(position_before, (1, 3));
    }

    #[tokio::test]
    async fn test_refresh_replaces_sequence_and_resets_cursor() {
        let library = Arc::new(
            FakeLibrary::new()
                .with_album_response(Ok(album(&["a", "b", "c"])))
                .with_album_response(Ok(album(&["x", "y"]))),
        );
        let cache = ShuffleCache::new(library, "family");
        cache.refresh().await.unwrap();
        cache.next().await.unwrap();
        cache.next().await.unwrap();

        assert_eq!(cache.refresh().await.unwrap(), 2);
        assert_eq!(cache.position(), (0, 2));

        let mut ids: Vec<_> = cache.order();
        ids.sort();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_refresh_does_not_block_next() {
        let library = Arc::new(
            FakeLibrary::new()
                .with_album_response(Ok(album(&["a", "b"])))
                .with_album_response(Ok(album(&["x", "y"])))
                .with_delay(Duration::from_secs(30)),
        );
        let cache = Arc::new(ShuffleCache::new(library, "family"));
        cache.refresh().await.unwrap();

        let refreshing = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh().await })
        };
        tokio::task::yield_now().await;

        // The second fetch is still sleeping; the old album keeps serving
        let record = cache.next().await.unwrap();
        assert!(["a", "b"].contains(&record.id()));

        assert_eq!(refreshing.await.unwrap().unwrap(), 2);
        let record = cache.next().await.unwrap();
        assert!(["x", "y"].contains(&record.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_do_not_overlap() {
        let library = Arc::new(
            FakeLibrary::new()
                .with_album_response(Ok(album(&["a"])))
                .with_album_response(Ok(album(&["b"])))
                .with_delay(Duration::from_secs(1)),
        );
        let cache = Arc::new(ShuffleCache::new(library.clone(), "family"));

        let (first, second) = tokio::join!(cache.refresh(), cache.refresh());
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(FakeLibrary::calls(&library.album_calls), 2);
        assert_eq!(FakeLibrary::calls(&library.max_in_flight), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_task_retries_initial_load_then_refreshes() {
        let library = Arc::new(
            FakeLibrary::new()
                .with_album_response(Err(status_error("albums")))
                .with_album_response(Err(status_error("albums")))
                .with_album_response(Ok(album(&["a", "b", "c"])))
                .with_album_response(Err(status_error("albums"))),
        );
        let cache = Arc::new(ShuffleCache::new(library.clone(), "family"));
        let cancel = CancellationToken::new();
        let every = Duration::from_secs(300);

        let handle = spawn_refresh_task(cache.clone(), every, cancel.clone());

        // Attempts at t=0, t=5 and t=10
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(FakeLibrary::calls(&library.album_calls), 3);
        assert_eq!(cache.len(), 3);

        // First periodic refresh at t=310 fails; the album stays in service
        tokio::time::sleep(every).await;
        assert_eq!(FakeLibrary::calls(&library.album_calls), 4);
        assert_eq!(cache.len(), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_task_stops_while_retrying() {
        let library = Arc::new(FakeLibrary::new().with_album_response(Err(status_error("albums"))));
        let cache = Arc::new(ShuffleCache::new(library.clone(), "family"));
        let cancel = CancellationToken::new();

        let handle = spawn_refresh_task(cache, DEFAULT_REFRESH_INTERVAL, cancel.clone());
        tokio::task::yield_now().await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(FakeLibrary::calls(&library.album_calls), 1);
    }
}
