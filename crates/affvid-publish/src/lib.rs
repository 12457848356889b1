//! Video publishing to the hosting platform.

pub mod error;
pub mod metadata;
pub mod youtube;

use std::path::Path;

use async_trait::async_trait;

pub use error::PublishError;
pub use metadata::{Privacy, VideoMetadata, DEFAULT_CATEGORY_ID, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
pub use youtube::YouTubeClient;

/// Uploads a produced video and returns the platform's id for it.
#[async_trait]
pub trait VideoPublisher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PublishError`] when the file cannot be read or the platform
    /// rejects the upload.
    async fn publish(&self, file_path: &Path, metadata: &VideoMetadata) -> Result<String, PublishError>;
}
