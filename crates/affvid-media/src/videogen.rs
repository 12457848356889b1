//! Client for the asynchronous video-generation API.
//!
//! A render is a three-step exchange: submit a prompt and receive a job id,
//! poll the job until it reaches a terminal status, then download the
//! produced file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::error::MediaError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    background_image_urls: Option<Vec<&'a str>>,
}

/// The observed state of a render job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Status `Success`. The media URL is resolved from `file.fileUrl`,
    /// then `signedUrl`, then `apiFileSignedUrl`.
    Succeeded { media_url: Option<String> },
    /// Status `Fail`, with the full response payload.
    Failed { payload: Value },
    /// Any other status, including a missing one.
    InProgress { status: Option<String> },
}

impl JobState {
    fn from_payload(payload: Value) -> Self {
        match payload.get("status").and_then(Value::as_str) {
            Some("Success") => {
                let media_url = payload
                    .pointer("/file/fileUrl")
                    .and_then(Value::as_str)
                    .or_else(|| payload.get("signedUrl").and_then(Value::as_str))
                    .or_else(|| payload.get("apiFileSignedUrl").and_then(Value::as_str))
                    .filter(|u| !u.is_empty())
                    .map(str::to_owned);
                JobState::Succeeded { media_url }
            }
            Some("Fail") => JobState::Failed { payload },
            other => JobState::InProgress {
                status: other.map(str::to_owned),
            },
        }
    }
}

pub struct VideoGenClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VideoGenClient {
    /// # Errors
    ///
    /// Returns [`MediaError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    /// Submits a render job and returns its id. Not retried.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::UnexpectedStatus`] on a non-2xx response,
    /// [`MediaError::MissingJobId`] if the response has no `apiFileId`, or
    /// [`MediaError::Http`] on network failure.
    pub async fn submit(&self, script: &str, image_url: Option<&str>) -> Result<String, MediaError> {
        let url = format!("{}/v2/prompt-to-video", self.base_url);
        let body = SubmitRequest {
            prompt: script,
            background_image_urls: image_url.filter(|u| !u.is_empty()).map(|u| vec![u]),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let payload = read_json(response, &url).await?;

        let job_id = match payload.get("apiFileId") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(MediaError::MissingJobId),
        };
        tracing::info!(job_id = %job_id, "render job submitted");
        Ok(job_id)
    }

    /// Queries the current state of a job.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::UnexpectedStatus`] on a non-2xx response or
    /// [`MediaError::Http`] on network failure.
    pub async fn job_status(&self, job_id: &str) -> Result<JobState, MediaError> {
        let url = format!("{}/v2/get-file", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("apiFileId", job_id)])
            .send()
            .await?;
        let payload = read_json(response, &url).await?;
        Ok(JobState::from_payload(payload))
    }

    /// Polls a job until it succeeds, fails, or `timeout` elapses.
    ///
    /// Each iteration sleeps `interval` first and then queries, so a check
    /// always follows the final sleep. The timeout is measured on the wall
    /// clock and is only reported once at least `timeout` has passed.
    ///
    /// # Errors
    ///
    /// - [`MediaError::JobFailed`] as soon as the job reports `Fail`.
    /// - [`MediaError::MissingMediaUrl`] if it succeeds without a URL.
    /// - [`MediaError::JobTimeout`] once `timeout` has elapsed.
    /// - Any error from [`VideoGenClient::job_status`].
    pub async fn poll(
        &self,
        job_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<String, MediaError> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(interval).await;

            match self.job_status(job_id).await? {
                JobState::Succeeded {
                    media_url: Some(url),
                } => {
                    tracing::info!(job_id, elapsed = ?started.elapsed(), "render job finished");
                    return Ok(url);
                }
                JobState::Succeeded { media_url: None } => {
                    return Err(MediaError::MissingMediaUrl {
                        job_id: job_id.to_owned(),
                    });
                }
                JobState::Failed { payload } => {
                    return Err(MediaError::JobFailed {
                        job_id: job_id.to_owned(),
                        payload: payload.to_string(),
                    });
                }
                JobState::InProgress { status } => {
                    tracing::debug!(job_id, status = ?status, "render job in progress");
                }
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(MediaError::JobTimeout {
                    job_id: job_id.to_owned(),
                    waited,
                });
            }
        }
    }

    /// Downloads `url` to `dest`.
    ///
    /// The body is streamed to `<dest>.part` and renamed into place once
    /// complete; the partial file is removed on any failure.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Download`] on a non-2xx response,
    /// [`MediaError::Http`] if the transfer breaks, or [`MediaError::Io`] if
    /// the file cannot be written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, MediaError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MediaError::Download {
                status: response.status().as_u16(),
                url: url.to_owned(),
            });
        }

        stream_to_file(response, dest).await?;
        tracing::info!(url, path = %dest.display(), "media downloaded");
        Ok(dest.to_path_buf())
    }
}

/// Reads a 2xx JSON body, mapping other statuses to
/// [`MediaError::UnexpectedStatus`].
async fn read_json(response: reqwest::Response, url: &str) -> Result<Value, MediaError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(MediaError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| MediaError::Deserialize {
        context: url.to_owned(),
        source: e,
    })
}

/// Writes a response body to `<dest>.part`, then renames it to `dest`.
pub(crate) async fn stream_to_file(
    mut response: reqwest::Response,
    dest: &Path,
) -> Result<(), MediaError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MediaError::io(parent, e))?;
    }

    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = async {
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| MediaError::io(&part, e))?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| MediaError::io(&part, e))?;
        }
        file.flush().await.map_err(|e| MediaError::io(&part, e))?;
        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| MediaError::io(dest, e))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}
