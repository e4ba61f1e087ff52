//! # Sources Module
//!
//! Access to the remote photo library that feeds the frame.
//!
//! The caches never talk HTTP directly. They depend on the [`PhotoLibrary`]
//! trait, which exposes the four upstream operations the feed needs:
//!
//! - **Metadata search**: one page of image metadata (`search_page`)
//! - **Random asset**: one random asset with EXIF data (`random_asset`)
//! - **Album**: every asset of a finite album (`fetch_album`)
//! - **Asset detail**: the location of one asset, for lazy lookups (`asset_location`)
//!
//! Each call is exactly one round trip with a bounded timeout. Retrying is
//! the caller's business: the sampler loops over random pages, the shuffler
//! keeps its previous sequence when a refresh fails.
//!
//! Screenshots are never "usable" records. [`immich::ImmichClient`] drops them
//! from search results and albums, and reports a screenshot from the random
//! endpoint as no asset at all. The caches still check [`Asset::is_usable`],
//! which also rejects non-image assets.
//!
//! Album and asset ids travel as one percent-encoded path segment each.

pub mod immich;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::PhotoRecord;
use crate::error::LibraryError;
use crate::format::build_location;

pub use immich::ImmichClient;

/// Trait común para las fuentes de fotos
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Fetches one page of image metadata. Screenshots are already removed.
    async fn search_page(&self, page: u32, page_size: u32) -> Result<SearchPage, LibraryError>;

    /// Fetches a single random asset, if the library returned a usable one.
    async fn random_asset(&self) -> Result<Option<Asset>, LibraryError>;

    /// Fetches every asset of an album, in album order, minus screenshots.
    async fn fetch_album(&self, album_id: &str) -> Result<Vec<Asset>, LibraryError>;

    /// Looks up the display location of one asset.
    async fn asset_location(&self, asset_id: &str) -> Result<String, LibraryError>;

    fn source_name(&self) -> &'static str;
}

/// One page of search results, already mapped to records.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub records: Vec<PhotoRecord>,
    pub has_more: bool,
}

/// Asset as returned by the random, album and detail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(rename = "fileCreatedAt", default)]
    pub file_created_at: String,
    #[serde(rename = "originalFileName", default)]
    pub original_file_name: String,
    #[serde(rename = "exifInfo", default)]
    pub exif_info: Option<ExifInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExifInfo {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ExifInfo {
    pub fn location(&self) -> String {
        build_location(
            self.city.as_deref().unwrap_or_default(),
            self.state.as_deref().unwrap_or_default(),
            self.country.as_deref().unwrap_or_default(),
        )
    }
}

impl Asset {
    pub fn is_image(&self) -> bool {
        self.asset_type.eq_ignore_ascii_case("IMAGE")
    }

    /// Image assets that are not screenshots.
    pub fn is_usable(&self) -> bool {
        self.is_image() && !is_screenshot(&self.original_file_name)
    }

    pub fn location(&self) -> String {
        self.exif_info
            .as_ref()
            .map(ExifInfo::location)
            .unwrap_or_default()
    }
}

/// Case-insensitive "screenshot" match on the original file name.
pub fn is_screenshot(file_name: &str) -> bool {
    file_name.to_lowercase().contains("screenshot")
}
