//! Shared domain types and configuration for the affiliate video pipeline.

pub mod analysis;
pub mod app_config;
pub mod config;
pub mod products;
pub mod stage;

use thiserror::Error;

pub use analysis::Analysis;
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{affiliate_link, ExtractedProduct, ProductBrief, ProductMeta, PLACEHOLDER_TITLE};
pub use stage::{PublishStatus, Stage};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid publish status: {0}")]
    InvalidPublishStatus(String),
}
