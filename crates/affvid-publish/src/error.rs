use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is empty")]
    EmptyFile { path: String },

    #[error("upload {stage} returned status {status}: {body}")]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },

    #[error("upload session response had no Location header")]
    MissingSessionUri,

    #[error("upload completed without a video id")]
    MissingVideoId,

    #[error("upload stalled at byte {offset}")]
    UploadStalled { offset: u64 },
}
