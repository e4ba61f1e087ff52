use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{is_screenshot, Asset, ExifInfo, PhotoLibrary, SearchPage};
use crate::cache::PhotoRecord;
use crate::error::LibraryError;
use crate::format::format_date;

const API_KEY_HEADER: &str = "x-api-key";

const SEARCH_ENDPOINT: &str = "search/metadata";
const RANDOM_ENDPOINT: &str = "assets/random";
const ALBUM_ENDPOINT: &str = "albums";
const ASSET_ENDPOINT: &str = "assets";

const SEARCH_PATH: [&str; 2] = ["search", "metadata"];
const RANDOM_PATH: [&str; 2] = ["assets", "random"];

/// Cliente para la API de Immich
pub struct ImmichClient {
    client: reqwest::Client,
    base_url: Url,
    device_model: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    #[serde(rename = "type")]
    asset_type: &'static str,
    page: u32,
    size: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    assets: SearchAssets,
}

#[derive(Debug, Deserialize)]
struct SearchAssets {
    #[serde(default)]
    items: Vec<SearchAsset>,
    #[serde(rename = "nextPage", default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchAsset {
    id: String,
    #[serde(rename = "fileCreatedAt", default)]
    file_created_at: String,
    #[serde(rename = "originalFileName", default)]
    original_file_name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct AssetDetail {
    #[serde(rename = "exifInfo", default)]
    exif_info: Option<ExifInfo>,
}

impl ImmichClient {
    /// Builds a client whose every request carries the API key and the
    /// given timeout.
    pub fn new(
        base_url: &Url,
        api_key: &str,
        device_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).context("API key is not a valid header value")?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.clone(),
            device_model: device_model.into(),
        })
    }

    /// `{base}/api/{segments}`, each segment percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, LibraryError> {
        let mut endpoint = self.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|()| LibraryError::InvalidUrl {
                path: segments.join("/"),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(endpoint)
    }

    /// Ids that would not survive as a single path segment are refused.
    fn path_id<'a>(endpoint: &'static str, id: &'a str) -> Result<&'a str, LibraryError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(LibraryError::InvalidId {
                endpoint,
                id: id.to_string(),
            });
        }
        Ok(id)
    }

    async fn send(
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LibraryError> {
        let response = request.send().await.map_err(|source| {
            warn!("❌ {} request error: {}", endpoint, source);
            LibraryError::Transport { endpoint, source }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("❌ {} returned status {}: {}", endpoint, status, body);
            return Err(LibraryError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> Result<T, LibraryError> {
        response.json::<T>().await.map_err(|source| {
            warn!("❌ {} decode error: {}", endpoint, source);
            LibraryError::Decode { endpoint, source }
        })
    }
}

#[async_trait]
impl PhotoLibrary for ImmichClient {
    async fn search_page(&self, page: u32, page_size: u32) -> Result<SearchPage, LibraryError> {
        let url = self.endpoint(&SEARCH_PATH)?;
        let body = SearchRequest {
            asset_type: "IMAGE",
            page,
            size: page_size,
            model: &self.device_model,
        };

        let response = Self::send(SEARCH_ENDPOINT, self.client.post(url).json(&body)).await?;
        let result: SearchResponse = Self::decode(SEARCH_ENDPOINT, response).await?;

        let returned = result.assets.items.len();
        let has_more = result
            .assets
            .next_page
            .as_deref()
            .is_some_and(|next| !next.is_empty())
            && returned >= page_size as usize;

        let records: Vec<PhotoRecord> = result
            .assets
            .items
            .into_iter()
            .filter(|asset| !is_screenshot(&asset.original_file_name))
            .map(|asset| PhotoRecord::new(asset.id, format_date(&asset.file_created_at)))
            .collect();

        debug!(
            "🔍 Search page {}: {} items, {} usable, has_more={}",
            page,
            returned,
            records.len(),
            has_more
        );

        Ok(SearchPage { records, has_more })
    }

    async fn random_asset(&self) -> Result<Option<Asset>, LibraryError> {
        let url = self.endpoint(&RANDOM_PATH)?;
        let request = self.client.get(url).query(&[("count", "1")]);

        let response = Self::send(RANDOM_ENDPOINT, request).await?;
        let assets: Vec<Asset> = Self::decode(RANDOM_ENDPOINT, response).await?;

        match assets.into_iter().next() {
            Some(asset) if is_screenshot(&asset.original_file_name) => {
                debug!("📵 Random asset {} is a screenshot, skipped", asset.id);
                Ok(None)
            }
            asset => Ok(asset),
        }
    }

    async fn fetch_album(&self, album_id: &str) -> Result<Vec<Asset>, LibraryError> {
        let id = Self::path_id(ALBUM_ENDPOINT, album_id)?;
        let url = self.endpoint(&[ALBUM_ENDPOINT, id])?;

        let response = Self::send(ALBUM_ENDPOINT, self.client.get(url)).await?;
        let album: AlbumResponse = Self::decode(ALBUM_ENDPOINT, response).await?;

        let returned = album.assets.len();
        let assets: Vec<Asset> = album
            .assets
            .into_iter()
            .filter(|asset| !is_screenshot(&asset.original_file_name))
            .collect();

        debug!(
            "📚 Album {} returned {} assets, {} without screenshots",
            album_id,
            returned,
            assets.len()
        );
        Ok(assets)
    }

    async fn asset_location(&self, asset_id: &str) -> Result<String, LibraryError> {
        let id = Self::path_id(ASSET_ENDPOINT, asset_id)?;
        let url = self.endpoint(&[ASSET_ENDPOINT, id])?;

        let response = Self::send(ASSET_ENDPOINT, self.client.get(url)).await?;
        let detail: AssetDetail = Self::decode(ASSET_ENDPOINT, response).await?;

        Ok(detail
            .exif_info
            .as_ref()
            .map(ExifInfo::location)
            .unwrap_or_default())
    }

    fn source_name(&self) -> &'static str {
        "Immich"
    }
}
