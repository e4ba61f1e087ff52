use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::cache::shuffle::DEFAULT_REFRESH_INTERVAL;

/// Which photo strategy feeds the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Random pages of the whole library, no repeats within a cycle.
    RandomPage,
    /// One album, shuffled locally.
    Album,
    /// The library's random endpoint, a few attempts per photo.
    RandomAsset,
}

impl FromStr for FeedMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random-page" | "random_page" | "library" => Ok(Self::RandomPage),
            "album" => Ok(Self::Album),
            "random-asset" | "random_asset" | "random" => Ok(Self::RandomAsset),
            other => anyhow::bail!(
                "Unknown FEED_MODE '{}', expected random-page, album or random-asset",
                other
            ),
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RandomPage => "random-page",
            Self::Album => "album",
            Self::RandomAsset => "random-asset",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Immich
    pub immich_url: Url,
    pub immich_api_key: String,
    pub device_model: String,

    // Feed
    pub feed_mode: FeedMode,
    pub album_id: Option<String>,
    pub pages_in_library: u32,

    // Tiempos
    pub request_timeout: Duration,
    pub refresh_interval: Duration,
    pub slideshow_interval: u64, // En segundos

    // Servidor web (externo)
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, environment or not.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let immich_url = var("IMMICH_URL")
            .context("IMMICH_URL and IMMICH_API_KEY environment variables are required")?;
        let immich_api_key = var("IMMICH_API_KEY")
            .context("IMMICH_URL and IMMICH_API_KEY environment variables are required")?;

        let config = Self {
            // Immich
            immich_url: Url::parse(immich_url.trim())
                .with_context(|| format!("IMMICH_URL is not a valid URL: {}", immich_url))?,
            immich_api_key,
            device_model: var("DEVICE_MODEL").unwrap_or_else(|| "iPhone 14 Pro".to_string()),

            // Feed
            feed_mode: var("FEED_MODE")
                .unwrap_or_else(|| "random-page".to_string())
                .parse()?,
            album_id: var("ALBUM_ID"),
            pages_in_library: var("PAGES_IN_LIBRARY")
                .unwrap_or_else(|| "85000".to_string())
                .trim()
                .parse()
                .context("PAGES_IN_LIBRARY must be a positive integer")?,

            // Tiempos
            request_timeout: humantime::parse_duration(
                var("REQUEST_TIMEOUT").as_deref().unwrap_or("120s").trim(),
            )
            .context("REQUEST_TIMEOUT must be a duration such as 120s or 2m")?,
            refresh_interval: match var("REFRESH_INTERVAL") {
                Some(value) => humantime::parse_duration(value.trim())
                    .context("REFRESH_INTERVAL must be a duration such as 5m")?,
                None => DEFAULT_REFRESH_INTERVAL,
            },
            // Non-positive or unparsable values fall back to the default
            slideshow_interval: var("SLIDESHOW_INTERVAL")
                .and_then(|value| value.trim().parse::<i64>().ok())
                .filter(|seconds| *seconds > 0)
                .map(|seconds| seconds as u64)
                .unwrap_or(15),

            port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .trim()
                .parse()
                .context("PORT must be a valid port number")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Immich URL must be http or https
    /// - The library must span at least one page
    /// - Album mode needs an album id
    /// - Timeouts and intervals must be non-zero
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.immich_url.scheme(), "http" | "https") {
            anyhow::bail!("IMMICH_URL must use http or https, got: {}", self.immich_url);
        }

        if self.pages_in_library == 0 {
            anyhow::bail!("PAGES_IN_LIBRARY must be greater than 0");
        }

        if self.feed_mode == FeedMode::Album && self.album_id.is_none() {
            anyhow::bail!("ALBUM_ID is required when FEED_MODE is album");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("REQUEST_TIMEOUT must be greater than 0");
        }

        if self.refresh_interval.is_zero() {
            anyhow::bail!("REFRESH_INTERVAL must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The API key is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Immich: {} (model filter: {})\n  \
            Feed: {} (album: {}, pages: {}, cycle: ~{} photos)\n  \
            Timing: {} request timeout, {} refresh, {}s slideshow\n  \
            Port: {}",
            self.immich_url,
            self.device_model,
            self.feed_mode,
            self.album_id.as_deref().unwrap_or("-"),
            self.pages_in_library,
            self.pages_in_library as usize * crate::cache::sampling::RECORDS_PER_PAGE,
            humantime::format_duration(self.request_timeout),
            humantime::format_duration(self.refresh_interval),
            self.slideshow_interval,
            self.port
        )
    }
}
