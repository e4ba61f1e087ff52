use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cache;
mod config;
mod error;
mod format;
mod service;
mod sources;

use crate::cache::shuffle::spawn_refresh_task;
use crate::cache::{PhotoFeed, RandomAssetPicker, SamplingCache, ShuffleCache};
use crate::config::{Config, FeedMode};
use crate::service::PhotoService;
use crate::sources::{ImmichClient, PhotoLibrary};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("immich_frame=debug".parse()?)
                .add_directive("reqwest=info".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    info!("🖼️ Starting Immich Frame v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let library: Arc<dyn PhotoLibrary> = Arc::new(ImmichClient::new(
        &config.immich_url,
        &config.immich_api_key,
        config.device_model.clone(),
        config.request_timeout,
    )?);
    info!("📡 Photo source: {}", library.source_name());

    let cancel = CancellationToken::new();
    let mut background = Vec::new();

    let feed: Arc<dyn PhotoFeed> = match config.feed_mode {
        FeedMode::RandomPage => Arc::new(SamplingCache::new(
            library.clone(),
            config.pages_in_library,
        )),
        FeedMode::Album => {
            let album_id = config
                .album_id
                .clone()
                .context("ALBUM_ID is required when FEED_MODE is album")?;
            let cache = Arc::new(ShuffleCache::new(library.clone(), album_id));
            info!("📚 Loading album {} in the background", cache.album_id());
            background.push(spawn_refresh_task(
                cache.clone(),
                config.refresh_interval,
                cancel.clone(),
            ));
            cache
        }
        FeedMode::RandomAsset => Arc::new(RandomAssetPicker::new(library.clone())),
    };

    let service = PhotoService::new(feed, library);
    info!(
        "🚀 Feed '{}' ready, web layer expected on port {}",
        service.strategy_name(),
        config.port
    );

    // Manejar shutdown graceful
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Error al registrar Ctrl+C: {}", e);
            }
            info!("⚠️ Shutdown signal received, stopping...");
            cancel.cancel();
        });
    }

    run_slideshow(
        &service,
        Duration::from_secs(config.slideshow_interval),
        cancel,
    )
    .await;

    for handle in background {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    info!("👋 Immich Frame stopped");
    Ok(())
}

/// Emits one photo per interval as a JSON line until `cancel` fires.
///
/// Stands in for the frame's web layer: it asks the service exactly the way
/// a `/random` request would.
async fn run_slideshow(service: &PhotoService, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match service.next_photo().await {
                Some(photo) => match serde_json::to_string(&photo) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Could not encode photo {}: {}", photo.id, e),
                },
                None => warn!("⏳ Loading photos... nothing ready yet"),
            }
        }
    }
}
