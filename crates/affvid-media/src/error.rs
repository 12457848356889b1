use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("job submission response carried no apiFileId")]
    MissingJobId,

    #[error("render job {job_id} failed: {payload}")]
    JobFailed { job_id: String, payload: String },

    #[error("render job {job_id} did not finish within {waited:?}")]
    JobTimeout { job_id: String, waited: Duration },

    #[error("render job {job_id} succeeded without a media URL")]
    MissingMediaUrl { job_id: String },

    #[error("download of {url} failed with status {status}")]
    Download { status: u16, url: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl MediaError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        MediaError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
