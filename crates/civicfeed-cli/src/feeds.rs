//! Feed command handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use civicfeed_core::{AppConfig, FeedBatch, SourceConfig, SourcesFile};
use civicfeed_ingest::{FeedPipeline, GeocodeResolver, GoogleGeocoder, ReqwestFetcher};

type Pipeline = FeedPipeline<ReqwestFetcher, GoogleGeocoder>;

fn load_sources(config: &AppConfig) -> anyhow::Result<SourcesFile> {
    civicfeed_core::load_sources(&config.sources_path)
        .with_context(|| format!("loading {}", config.sources_path.display()))
}

fn find_source<'a>(sources: &'a SourcesFile, slug: &str) -> anyhow::Result<&'a SourceConfig> {
    sources.find(slug).with_context(|| {
        let known: Vec<&str> = sources.sources.iter().map(|s| s.slug.as_str()).collect();
        format!("unknown source '{slug}' (known: {})", known.join(", "))
    })
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<Pipeline> {
    let geocoder = match config.geocode_base_url.as_deref() {
        Some(base_url) => GoogleGeocoder::with_base_url(
            config.geocode_api_key.clone(),
            config.fetch_timeout_secs,
            &config.user_agent,
            base_url,
        )?,
        None => GoogleGeocoder::new(
            config.geocode_api_key.clone(),
            config.fetch_timeout_secs,
            &config.user_agent,
        )?,
    };
    let resolver = GeocodeResolver::new(geocoder)
        .with_ttl(Duration::from_secs(config.geocode_cache_ttl_secs));
    let fetcher = ReqwestFetcher::new(config.fetch_timeout_secs, &config.user_agent)?;

    Ok(FeedPipeline::new(fetcher, Arc::new(resolver))
        .with_concurrency(config.geocode_concurrency))
}

fn print_batch(batch: &FeedBatch, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(batch)?
    } else {
        serde_json::to_string(batch)?
    };
    println!("{json}");
    Ok(())
}

/// Print one line per configured source.
///
/// # Errors
///
/// Returns an error if the sources file cannot be loaded.
pub(crate) fn run_sources(config: &AppConfig) -> anyhow::Result<()> {
    let sources = load_sources(config)?;
    for source in &sources.sources {
        let format = source
            .format
            .map_or_else(|| "auto".to_string(), |f| f.to_string());
        println!(
            "{:<16} {:<6} {:<24} {}",
            source.slug,
            format,
            source.city_label(),
            source.label
        );
    }
    Ok(())
}

/// Fetch a source's live feed and print the normalized batch.
///
/// # Errors
///
/// Returns an error if the source is unknown, the clients cannot be built,
/// or the pipeline fails fatally.
pub(crate) async fn run_fetch(config: &AppConfig, slug: &str, pretty: bool) -> anyhow::Result<()> {
    let sources = load_sources(config)?;
    let source = find_source(&sources, slug)?;
    let pipeline = build_pipeline(config)?;

    tracing::info!(source = %source.slug, url = %source.url, "fetching feed");
    let batch = pipeline
        .run(source)
        .await
        .with_context(|| format!("fetching source '{}'", source.slug))?;
    print_batch(&batch, pretty)
}

/// Normalize a saved feed body with a source's profile.
///
/// # Errors
///
/// Returns an error if the source is unknown, the file cannot be read, or
/// the pipeline fails fatally.
pub(crate) async fn run_process(
    config: &AppConfig,
    slug: &str,
    file: &Path,
    pretty: bool,
) -> anyhow::Result<()> {
    let sources = load_sources(config)?;
    let source = find_source(&sources, slug)?;
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let pipeline = build_pipeline(config)?;

    let batch = pipeline
        .process(source, &bytes)
        .await
        .with_context(|| format!("processing {} as '{}'", file.display(), source.slug))?;
    print_batch(&batch, pretty)
}
