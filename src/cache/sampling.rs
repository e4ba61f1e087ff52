use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{PhotoFeed, PhotoRecord};
use crate::sources::PhotoLibrary;

/// Random pages tried per replenish before giving up for this call.
pub const MAX_REPLENISH_ATTEMPTS: usize = 10;

/// Assumed average number of images per search page. Only used to size the
/// cycle; the real library size is never known.
pub const RECORDS_PER_PAGE: usize = 10;

/// Chooses which search page to sample next.
pub trait PagePicker: Send + Sync {
    /// Page number in `[1, pages]`.
    fn pick(&mut self, pages: u32) -> u32;
}

/// Uniformly random pages.
pub struct RandomPages {
    rng: StdRng,
}

impl RandomPages {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    #[allow(dead_code)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPages {
    fn default() -> Self {
        Self::new()
    }
}

impl PagePicker for RandomPages {
    fn pick(&mut self, pages: u32) -> u32 {
        self.rng.gen_range(1..=pages.max(1))
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStats {
    pub queued: usize,
    pub shown: usize,
    pub cycle_threshold: usize,
    pub cycles: u64,
}

struct SamplerState {
    queue: VecDeque<PhotoRecord>,
    shown: HashSet<String>,
    pages: Box<dyn PagePicker>,
    cycles: u64,
}

/// Random-page sampler over a library too large to enumerate.
///
/// Replenishes one record at a time from a random search page and refuses
/// ids already shown in the current cycle. The cycle ends, and the shown set
/// is cleared, once `pages_in_library * RECORDS_PER_PAGE` ids were handed out.
pub struct SamplingCache {
    library: Arc<dyn PhotoLibrary>,
    pages_in_library: u32,
    state: Mutex<SamplerState>,
}

impl SamplingCache {
    pub fn new(library: Arc<dyn PhotoLibrary>, pages_in_library: u32) -> Self {
        Self::with_page_picker(library, pages_in_library, Box::new(RandomPages::new()))
    }

    pub fn with_page_picker(
        library: Arc<dyn PhotoLibrary>,
        pages_in_library: u32,
        pages: Box<dyn PagePicker>,
    ) -> Self {
        Self {
            library,
            pages_in_library: pages_in_library.max(1),
            state: Mutex::new(SamplerState {
                queue: VecDeque::new(),
                shown: HashSet::new(),
                pages,
                cycles: 0,
            }),
        }
    }

    pub fn cycle_threshold(&self) -> usize {
        self.pages_in_library as usize * RECORDS_PER_PAGE
    }

    #[allow(dead_code)]
    pub async fn stats(&self) -> SamplerStats {
        let state = self.state.lock().await;
        SamplerStats {
            queued: state.queue.len(),
            shown: state.shown.len(),
            cycle_threshold: self.cycle_threshold(),
            cycles: state.cycles,
        }
    }

    /// Pulls at most one unseen record into the queue. Runs under the lock.
    async fn replenish(&self, state: &mut SamplerState) -> bool {
        for attempt in 1..=MAX_REPLENISH_ATTEMPTS {
            let page = state.pages.pick(self.pages_in_library);

            let result = match self.library.search_page(page, 1).await {
                Ok(result) => result,
                Err(e) => {
                    debug!("Attempt {}: page {} failed: {}", attempt, page, e);
                    continue;
                }
            };

            let has_more = result.has_more;
            let Some(record) = result.records.into_iter().next() else {
                if has_more {
                    debug!("Attempt {}: page {} only had screenshots", attempt, page);
                } else {
                    debug!("Attempt {}: page {} is past the end of the library", attempt, page);
                }
                continue;
            };

            if state.shown.contains(record.id()) {
                debug!("Attempt {}: page {} gave already shown {}", attempt, page, record.id());
                continue;
            }

            info!("📥 Fetched page {} (shown: {})", page, state.shown.len());
            state.queue.push_back(record);
            return true;
        }

        warn!(
            "⚠️ No unseen photo after {} attempts, try again later",
            MAX_REPLENISH_ATTEMPTS
        );
        false
    }
}

#[async_trait]
impl PhotoFeed for SamplingCache {
    async fn next(&self) -> Option<PhotoRecord> {
        let mut state = self.state.lock().await;

        if state.queue.is_empty() {
            self.replenish(&mut state).await;
        }

        let record = state.queue.pop_front()?;
        state.shown.insert(record.id().to_string());

        if state.shown.len() >= self.cycle_threshold() {
            info!("🔄 All {} photos shown, resetting cycle", state.shown.len());
            state.shown.clear();
            state.cycles += 1;
        }

        Some(record)
    }

    fn strategy_name(&self) -> &'static str {
        "random-page"
    }
}
