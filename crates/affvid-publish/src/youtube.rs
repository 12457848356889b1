//! Resumable chunked upload to the YouTube Data API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::PublishError;
use crate::metadata::VideoMetadata;
use crate::VideoPublisher;

/// Consecutive `308`s that may leave the stored offset unchanged before the
/// upload is abandoned.
const MAX_STALLED_CHUNKS: u32 = 3;

#[derive(Deserialize)]
struct InsertedVideo {
    id: Option<String>,
}

/// Uploads videos with the resumable protocol: one `POST` opens a session,
/// then the file is sent in `PUT` chunks of `chunk_bytes`.
pub struct YouTubeClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    chunk_bytes: usize,
}

impl YouTubeClient {
    /// `chunk_bytes` should be a multiple of 256 KiB for every chunk but the
    /// last; zero is treated as one byte.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(
        base_url: &str,
        access_token: &str,
        chunk_bytes: usize,
        timeout_secs: u64,
    ) -> Result<Self, PublishError> {
        // 308 is the protocol's "resume incomplete" signal, not a redirect.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            access_token: access_token.to_owned(),
            chunk_bytes: chunk_bytes.max(1),
        })
    }

    /// Opens an upload session and returns its URI.
    async fn start_session(
        &self,
        metadata: &VideoMetadata,
        total: u64,
    ) -> Result<String, PublishError> {
        let url = format!(
            "{}/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status",
            self.base_url
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", total)
            .json(&metadata.resource())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::UnexpectedStatus {
                stage: "session",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(PublishError::MissingSessionUri)
    }

    async fn upload_chunks(
        &self,
        session_uri: &str,
        file_path: &Path,
        total: u64,
    ) -> Result<String, PublishError> {
        let io_err = |e| PublishError::Io {
            path: file_path.display().to_string(),
            source: e,
        };
        let mut file = tokio::fs::File::open(file_path).await.map_err(io_err)?;
        let mut buf = vec![0u8; self.chunk_bytes];
        let mut offset = 0u64;
        let mut stalled = 0u32;

        loop {
            file.seek(std::io::SeekFrom::Start(offset))
                .await
                .map_err(io_err)?;
            let remaining = total - offset;
            let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
            file.read_exact(&mut buf[..want]).await.map_err(io_err)?;

            let end = offset + want as u64 - 1;
            let response = self
                .client
                .put(session_uri)
                .bearer_auth(&self.access_token)
                .header(header::CONTENT_RANGE, format!("bytes {offset}-{end}/{total}"))
                .body(buf[..want].to_vec())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::PERMANENT_REDIRECT {
                let stored = next_offset(response.headers().get(header::RANGE));
                if stored > offset {
                    stalled = 0;
                } else {
                    stalled += 1;
                    tracing::warn!(offset, stored, stalled, "upload chunk made no progress");
                    if stalled >= MAX_STALLED_CHUNKS {
                        return Err(PublishError::UploadStalled { offset: stored });
                    }
                }
                offset = stored;
                tracing::debug!(offset, total, "upload chunk accepted");
                if offset >= total {
                    // All bytes stored but the session stayed open.
                    return Err(PublishError::MissingVideoId);
                }
                continue;
            }

            if status == StatusCode::OK || status == StatusCode::CREATED {
                let body = response.text().await?;
                let inserted: InsertedVideo =
                    serde_json::from_str(&body).map_err(|_| PublishError::MissingVideoId)?;
                return inserted
                    .id
                    .filter(|id| !id.is_empty())
                    .ok_or(PublishError::MissingVideoId);
            }

            return Err(PublishError::UnexpectedStatus {
                stage: "chunk",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
    }
}

/// Offset of the next chunk after a `308`.
///
/// A `Range: bytes=0-N` header means bytes through `N` are stored; without
/// a readable header nothing is stored yet and the upload restarts at zero.
fn next_offset(range: Option<&header::HeaderValue>) -> u64 {
    range
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(_, last)| last.trim().parse::<u64>().ok())
        .map_or(0, |last| last + 1)
}

#[async_trait]
impl VideoPublisher for YouTubeClient {
    async fn publish(
        &self,
        file_path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<String, PublishError> {
        let total = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| PublishError::Io {
                path: file_path.display().to_string(),
                source: e,
            })?
            .len();
        if total == 0 {
            return Err(PublishError::EmptyFile {
                path: file_path.display().to_string(),
            });
        }

        let session_uri = self.start_session(metadata, total).await?;
        tracing::info!(path = %file_path.display(), total, "upload session opened");

        let video_id = self.upload_chunks(&session_uri, file_path, total).await?;
        tracing::info!(video_id = %video_id, title = %metadata.title, "video published");
        Ok(video_id)
    }
}
