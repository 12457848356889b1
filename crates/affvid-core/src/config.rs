use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Resumable uploads require chunk sizes in multiples of 256 KiB.
const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it from a
/// `HashMap` without `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> { lookup(var).ok().filter(|v| !v.is_empty()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_flag = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        parse_bool(&raw).ok_or_else(|| invalid(var, format!("expected a boolean, got \"{raw}\"")))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("AFFVID_ENV", "development"));
    let log_level = or_default("AFFVID_LOG_LEVEL", "info");
    let data_dir = PathBuf::from(or_default("AFFVID_DATA_DIR", "./data"));
    let output_dir = PathBuf::from(or_default("AFFVID_OUTPUT_DIR", "./output"));

    let db_max_connections = parse_u32("AFFVID_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("AFFVID_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("AFFVID_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("AFFVID_SCRAPER_REQUEST_TIMEOUT_SECS", "15")?;
    let scraper_user_agent = or_default("AFFVID_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_inter_request_delay_ms =
        parse_u64("AFFVID_SCRAPER_INTER_REQUEST_DELAY_MS", "1000")?;
    let scraper_max_retries = parse_u32("AFFVID_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_ms = parse_u64("AFFVID_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;
    let marketplace_base_url = or_default("AFFVID_MARKETPLACE_BASE_URL", "https://tiki.vn");

    let openai_api_key = optional("OPENAI_API_KEY");
    let llm_base_url = or_default("AFFVID_LLM_BASE_URL", "https://api.openai.com");
    let llm_model = or_default("AFFVID_LLM_MODEL", "gpt-4o-mini");
    let tts_model = or_default("AFFVID_TTS_MODEL", "gpt-4o-mini-tts");
    let tts_voice = or_default("AFFVID_TTS_VOICE", "alloy");
    let narration_enabled = parse_flag("AFFVID_NARRATION_ENABLED", "false")?;

    let videogen_api_key = optional("VIDEOGEN_API_KEY");
    let videogen_base_url = or_default("AFFVID_VIDEOGEN_BASE_URL", "https://ext.videogen.io");
    let videogen_poll_timeout_secs = parse_u64("AFFVID_VIDEOGEN_POLL_TIMEOUT_SECS", "300")?;
    let videogen_poll_interval_secs = parse_u64("AFFVID_VIDEOGEN_POLL_INTERVAL_SECS", "10")?;
    if videogen_poll_interval_secs == 0 {
        return Err(invalid(
            "AFFVID_VIDEOGEN_POLL_INTERVAL_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let youtube_access_token = optional("YOUTUBE_ACCESS_TOKEN");
    let youtube_base_url = or_default("AFFVID_YOUTUBE_BASE_URL", "https://www.googleapis.com");
    let upload_chunk_bytes = parse_usize("AFFVID_UPLOAD_CHUNK_BYTES", "8388608")?;
    if upload_chunk_bytes == 0 || upload_chunk_bytes % UPLOAD_CHUNK_GRANULARITY != 0 {
        return Err(invalid(
            "AFFVID_UPLOAD_CHUNK_BYTES",
            format!("must be a non-zero multiple of {UPLOAD_CHUNK_GRANULARITY}"),
        ));
    }

    let max_concurrent_products = parse_usize("AFFVID_MAX_CONCURRENT_PRODUCTS", "1")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        data_dir,
        output_dir,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_inter_request_delay_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        marketplace_base_url,
        openai_api_key,
        llm_base_url,
        llm_model,
        tts_model,
        tts_voice,
        narration_enabled,
        videogen_api_key,
        videogen_base_url,
        videogen_poll_timeout_secs,
        videogen_poll_interval_secs,
        youtube_access_token,
        youtube_base_url,
        upload_chunk_bytes,
        max_concurrent_products,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
