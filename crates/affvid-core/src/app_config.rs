use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Directory for analysis/script/narration side artifacts.
    pub data_dir: PathBuf,
    /// Directory for downloaded video files.
    pub output_dir: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_inter_request_delay_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    pub marketplace_base_url: String,
    pub openai_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub narration_enabled: bool,
    pub videogen_api_key: Option<String>,
    pub videogen_base_url: String,
    pub videogen_poll_timeout_secs: u64,
    pub videogen_poll_interval_secs: u64,
    pub youtube_access_token: Option<String>,
    pub youtube_base_url: String,
    /// Resumable upload chunk size; always a multiple of 256 KiB.
    pub upload_chunk_bytes: usize,
    pub max_concurrent_products: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("data_dir", &self.data_dir)
            .field("output_dir", &self.output_dir)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_inter_request_delay_ms",
                &self.scraper_inter_request_delay_ms,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_ms",
                &self.scraper_retry_backoff_base_ms,
            )
            .field("marketplace_base_url", &self.marketplace_base_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("tts_model", &self.tts_model)
            .field("tts_voice", &self.tts_voice)
            .field("narration_enabled", &self.narration_enabled)
            .field(
                "videogen_api_key",
                &self.videogen_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("videogen_base_url", &self.videogen_base_url)
            .field(
                "videogen_poll_timeout_secs",
                &self.videogen_poll_timeout_secs,
            )
            .field(
                "videogen_poll_interval_secs",
                &self.videogen_poll_interval_secs,
            )
            .field(
                "youtube_access_token",
                &self.youtube_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("youtube_base_url", &self.youtube_base_url)
            .field("upload_chunk_bytes", &self.upload_chunk_bytes)
            .field("max_concurrent_products", &self.max_concurrent_products)
            .finish()
    }
}
