//! Scriptable in-memory library for cache and service tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Asset, ExifInfo, PhotoLibrary, SearchPage};
use crate::cache::PhotoRecord;
use crate::error::LibraryError;

type SearchFn = dyn Fn(u32, usize) -> Result<SearchPage, LibraryError> + Send + Sync;

pub struct FakeLibrary {
    search: Box<SearchFn>,
    albums: Mutex<VecDeque<Result<Vec<Asset>, LibraryError>>>,
    randoms: Mutex<VecDeque<Result<Option<Asset>, LibraryError>>>,
    locations: HashMap<String, String>,
    delay: Duration,
    pub search_calls: AtomicUsize,
    pub album_calls: AtomicUsize,
    pub random_calls: AtomicUsize,
    pub location_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self {
            search: Box::new(|_, _| Ok(SearchPage::default())),
            albums: Mutex::new(VecDeque::new()),
            randoms: Mutex::new(VecDeque::new()),
            locations: HashMap::new(),
            delay: Duration::ZERO,
            search_calls: AtomicUsize::new(0),
            album_calls: AtomicUsize::new(0),
            random_calls: AtomicUsize::new(0),
            location_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// `search(page, call_number)` answers every metadata search.
    pub fn with_search(
        mut self,
        search: impl Fn(u32, usize) -> Result<SearchPage, LibraryError> + Send + Sync + 'static,
    ) -> Self {
        self.search = Box::new(search);
        self
    }

    pub fn with_album_response(self, response: Result<Vec<Asset>, LibraryError>) -> Self {
        self.albums.lock().push_back(response);
        self
    }

    pub fn with_random_response(self, response: Result<Option<Asset>, LibraryError>) -> Self {
        self.randoms.lock().push_back(response);
        self
    }

    pub fn with_location(mut self, asset_id: &str, location: &str) -> Self {
        self.locations.insert(asset_id.to_string(), location.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PhotoLibrary for FakeLibrary {
    async fn search_page(&self, page: u32, _page_size: u32) -> Result<SearchPage, LibraryError> {
        let call = self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        (self.search)(page, call)
    }

    async fn random_asset(&self) -> Result<Option<Asset>, LibraryError> {
        self.random_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        self.randoms.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn fetch_album(&self, _album_id: &str) -> Result<Vec<Asset>, LibraryError> {
        self.album_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        self.albums.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn asset_location(&self, asset_id: &str) -> Result<String, LibraryError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        self.locations
            .get(asset_id)
            .cloned()
            .ok_or_else(|| status_error("assets"))
    }

    fn source_name(&self) -> &'static str {
        "Fake"
    }
}

pub fn single_record(id: impl Into<String>) -> SearchPage {
    SearchPage {
        records: vec![PhotoRecord::new(id, "4 Mayıs 2023")],
        has_more: true,
    }
}

pub fn image_asset(id: &str, city: &str, country: &str) -> Asset {
    Asset {
        id: id.to_string(),
        asset_type: "IMAGE".to_string(),
        file_created_at: "2023-05-04T10:00:00.000Z".to_string(),
        original_file_name: format!("IMG_{}.HEIC", id),
        exif_info: Some(ExifInfo {
            city: Some(city.to_string()),
            state: None,
            country: Some(country.to_string()),
        }),
    }
}

pub fn status_error(endpoint: &'static str) -> LibraryError {
    LibraryError::Status {
        endpoint,
        status: 503,
        body: "unavailable".to_string(),
    }
}
