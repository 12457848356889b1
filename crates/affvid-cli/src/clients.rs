//! Builds the external-service clients from configuration.

use std::sync::Arc;
use std::time::Duration;

use affvid_content::OpenAiClient;
use affvid_core::AppConfig;
use affvid_media::{OpenAiSpeechClient, VideoGenClient, VideoGenProducer};
use affvid_publish::YouTubeClient;
use affvid_scraper::{MarketplaceClient, PageClient};
use anyhow::Context;

/// Model and speech calls can take far longer than a page fetch.
const API_TIMEOUT_SECS: u64 = 120;
/// Per request; each upload chunk is one request.
const UPLOAD_TIMEOUT_SECS: u64 = 600;

fn require<'a>(value: Option<&'a str>, var: &str) -> anyhow::Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{var} is not set; cannot run the pipeline"))
}

pub(crate) fn page_client(config: &AppConfig) -> anyhow::Result<PageClient> {
    PageClient::new(
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
        config.scraper_max_retries,
        config.scraper_retry_backoff_base_ms,
    )
    .context("failed to build page client")
}

pub(crate) fn marketplace_client(config: &AppConfig) -> anyhow::Result<MarketplaceClient> {
    Ok(MarketplaceClient::new(
        &config.marketplace_base_url,
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
        config.scraper_max_retries,
        config.scraper_retry_backoff_base_ms,
    )
    .context("failed to build marketplace client")?
    .with_inter_page_delay(Duration::from_millis(config.scraper_inter_request_delay_ms)))
}

pub(crate) fn text_generator(config: &AppConfig) -> anyhow::Result<Arc<OpenAiClient>> {
    let api_key = require(config.openai_api_key.as_deref(), "OPENAI_API_KEY")?;
    let client = OpenAiClient::new(&config.llm_base_url, api_key, API_TIMEOUT_SECS)
        .context("failed to build language model client")?;
    Ok(Arc::new(client))
}

pub(crate) fn video_producer(config: &AppConfig) -> anyhow::Result<Arc<VideoGenProducer>> {
    let api_key = require(config.videogen_api_key.as_deref(), "VIDEOGEN_API_KEY")?;
    let client = VideoGenClient::new(&config.videogen_base_url, api_key, API_TIMEOUT_SECS)
        .context("failed to build video generation client")?;
    Ok(Arc::new(VideoGenProducer::new(
        client,
        config.output_dir.clone(),
        Duration::from_secs(config.videogen_poll_timeout_secs),
        Duration::from_secs(config.videogen_poll_interval_secs),
    )))
}

pub(crate) fn publisher(config: &AppConfig) -> anyhow::Result<Arc<YouTubeClient>> {
    let token = require(config.youtube_access_token.as_deref(), "YOUTUBE_ACCESS_TOKEN")?;
    let client = YouTubeClient::new(
        &config.youtube_base_url,
        token,
        config.upload_chunk_bytes,
        UPLOAD_TIMEOUT_SECS,
    )
    .context("failed to build upload client")?;
    Ok(Arc::new(client))
}

/// `None` unless narration is enabled.
pub(crate) fn narrator(config: &AppConfig) -> anyhow::Result<Option<Arc<OpenAiSpeechClient>>> {
    if !config.narration_enabled {
        return Ok(None);
    }
    let api_key = require(config.openai_api_key.as_deref(), "OPENAI_API_KEY")?;
    let client = OpenAiSpeechClient::new(
        &config.llm_base_url,
        api_key,
        &config.tts_model,
        &config.tts_voice,
        API_TIMEOUT_SECS,
    )
    .context("failed to build speech client")?;
    Ok(Some(Arc::new(client)))
}
