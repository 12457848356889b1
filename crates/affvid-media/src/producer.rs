use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MediaError;
use crate::videogen::VideoGenClient;

/// What a producer needs to render one product video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    /// Names the output file.
    pub external_id: String,
    pub script: String,
    pub image_url: Option<String>,
}

/// Renders a script into a local video file.
#[async_trait]
pub trait VideoProducer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`MediaError`] when rendering or downloading fails.
    async fn produce(&self, request: &MediaRequest) -> Result<PathBuf, MediaError>;
}

/// Submit, poll, download. Files land at `<output_dir>/<external_id>.mp4`.
pub struct VideoGenProducer {
    client: VideoGenClient,
    output_dir: PathBuf,
    poll_timeout: Duration,
    poll_interval: Duration,
}

impl VideoGenProducer {
    #[must_use]
    pub fn new(
        client: VideoGenClient,
        output_dir: impl Into<PathBuf>,
        poll_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            poll_timeout,
            poll_interval,
        }
    }

    #[must_use]
    pub fn output_path(&self, external_id: &str) -> PathBuf {
        self.output_dir.join(format!("{external_id}.mp4"))
    }
}

#[async_trait]
impl VideoProducer for VideoGenProducer {
    async fn produce(&self, request: &MediaRequest) -> Result<PathBuf, MediaError> {
        let job_id = self
            .client
            .submit(&request.script, request.image_url.as_deref())
            .await?;
        let media_url = self
            .client
            .poll(&job_id, self.poll_timeout, self.poll_interval)
            .await?;
        self.client
            .download(&media_url, &self.output_path(&request.external_id))
            .await
    }
}
