//! Offline unit tests for affvid-db pool configuration and row types.
//! These tests do not require a live database connection.

use affvid_core::{AppConfig, Environment, PublishStatus};
use affvid_db::{PoolConfig, ProductRow, PublishLogRow, PublishOutcome};
use chrono::Utc;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

fn make_app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        data_dir: PathBuf::from("./data"),
        output_dir: PathBuf::from("./output"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 30,
        scraper_user_agent: "ua".to_string(),
        scraper_inter_request_delay_ms: 250,
        scraper_max_retries: 3,
        scraper_retry_backoff_base_ms: 500,
        marketplace_base_url: "https://tiki.vn".to_string(),
        openai_api_key: None,
        llm_base_url: "https://api.openai.com".to_string(),
        llm_model: "gpt-4o-mini".to_string(),
        tts_model: "gpt-4o-mini-tts".to_string(),
        tts_voice: "alloy".to_string(),
        narration_enabled: false,
        videogen_api_key: None,
        videogen_base_url: "https://videogen.test".to_string(),
        videogen_poll_timeout_secs: 600,
        videogen_poll_interval_secs: 5,
        youtube_access_token: None,
        youtube_base_url: "https://www.googleapis.com".to_string(),
        upload_chunk_bytes: 8 * 256 * 1024,
        max_concurrent_products: 2,
    }
}

fn make_product_row(url: &str, tag: Option<&str>) -> ProductRow {
    ProductRow {
        id: 1,
        external_id: "B0TEST0001".to_string(),
        title: "Test Widget".to_string(),
        url: url.to_string(),
        image: None,
        price: Some(Decimal::from_str("19.99").unwrap()),
        rating: Some(Decimal::from_str("4.5").unwrap()),
        affiliate_tag: tag.map(str::to_string),
        description: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&make_app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn product_row_meta_carries_affiliate_link() {
    let row = make_product_row("https://www.amazon.com/dp/B0TEST0001", Some("abc-20"));
    let meta = row.meta();

    assert_eq!(meta.title.as_deref(), Some("Test Widget"));
    assert_eq!(meta.price, Some(Decimal::from_str("19.99").unwrap()));
    assert_eq!(
        meta.affiliate_link.as_deref(),
        Some("https://www.amazon.com/dp/B0TEST0001?tag=abc-20")
    );
}

#[test]
fn product_row_brief_uses_stored_fields() {
    let row = make_product_row("https://www.amazon.com/dp/B0TEST0001", None);
    let brief = row.brief();
    assert_eq!(brief.title, "Test Widget");
    assert!(brief.description.is_none());
}

#[test]
fn publish_log_row_parses_status() {
    let row = PublishLogRow {
        id: 1,
        video_id: 2,
        platform: "youtube".to_string(),
        status: "failed".to_string(),
        message: Some("quota exceeded".to_string()),
        remote_video_id: None,
        published_at: None,
        created_at: Utc::now(),
    };
    assert_eq!(row.parsed_status().unwrap(), PublishStatus::Failed);
}

#[test]
fn publish_outcome_maps_to_terminal_status() {
    let ok = PublishOutcome::Success {
        remote_video_id: "abc123".to_string(),
        message: None,
    };
    let failed = PublishOutcome::Failed {
        message: "boom".to_string(),
    };
    assert_eq!(ok.status(), PublishStatus::Success);
    assert_eq!(failed.status(), PublishStatus::Failed);
    assert!(ok.status().is_terminal());
}
