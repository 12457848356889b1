//! Database operations for `publish_logs`.
//!
//! A log row is created `pending` when an upload starts and moves exactly
//! once to `success` or `failed`. Terminal rows are never rewritten.

use affvid_core::{CoreError, PublishStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{is_foreign_key_violation, DbError};

pub const DEFAULT_PLATFORM: &str = "youtube";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `publish_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublishLogRow {
    pub id: i64,
    pub video_id: i64,
    pub platform: String,
    /// One of `pending`, `success`, `failed`.
    pub status: String,
    pub message: Option<String>,
    pub remote_video_id: Option<String>,
    /// Set iff `status = 'success'`.
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PublishLogRow {
    /// Parses the stored status string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPublishStatus`] for a value outside the
    /// schema's check constraint.
    pub fn parsed_status(&self) -> Result<PublishStatus, CoreError> {
        self.status.parse()
    }
}

/// The terminal result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Success {
        remote_video_id: String,
        message: Option<String>,
    },
    Failed {
        message: String,
    },
}

impl PublishOutcome {
    #[must_use]
    pub fn status(&self) -> PublishStatus {
        match self {
            PublishOutcome::Success { .. } => PublishStatus::Success,
            PublishOutcome::Failed { .. } => PublishStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// publish_logs operations
// ---------------------------------------------------------------------------

/// Opens a `pending` publish log for a video.
///
/// # Errors
///
/// Returns [`DbError::VideoNotFound`] if `video_id` does not reference a row,
/// or [`DbError::Sqlx`] if the insert fails for another reason.
pub async fn create_publish_log(
    pool: &PgPool,
    video_id: i64,
    platform: &str,
) -> Result<PublishLogRow, DbError> {
    sqlx::query_as::<_, PublishLogRow>(
        "INSERT INTO publish_logs (video_id, platform, status) \
         VALUES ($1, $2, 'pending') \
         RETURNING id, video_id, platform, status, message, remote_video_id, \
                   published_at, created_at",
    )
    .bind(video_id)
    .bind(platform)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            DbError::VideoNotFound { video_id }
        } else {
            DbError::Sqlx(e)
        }
    })
}

/// Moves a `pending` log to its terminal status.
///
/// On success `published_at` is set to `NOW()` and `remote_video_id` is
/// recorded. The update is conditional on `status = 'pending'`, so a log can
/// be finished at most once.
///
/// # Errors
///
/// Returns [`DbError::MissingFailureMessage`] for a failed outcome with a
/// blank message, [`DbError::NotFound`] if the log does not exist,
/// [`DbError::InvalidPublishLogTransition`] if it is already terminal, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn finish_publish_log(
    pool: &PgPool,
    id: i64,
    outcome: &PublishOutcome,
) -> Result<PublishLogRow, DbError> {
    let (message, remote_video_id) = match outcome {
        PublishOutcome::Success {
            remote_video_id,
            message,
        } => (message.as_deref(), Some(remote_video_id.as_str())),
        PublishOutcome::Failed { message } => {
            if message.trim().is_empty() {
                return Err(DbError::MissingFailureMessage { id });
            }
            (Some(message.as_str()), None)
        }
    };
    let status = outcome.status();

    let updated = sqlx::query_as::<_, PublishLogRow>(
        "UPDATE publish_logs \
         SET status          = $1, \
             message         = $2, \
             remote_video_id = $3, \
             published_at    = CASE WHEN $1 = 'success' THEN NOW() ELSE NULL END \
         WHERE id = $4 AND status = 'pending' \
         RETURNING id, video_id, platform, status, message, remote_video_id, \
                   published_at, created_at",
    )
    .bind(status.as_str())
    .bind(message)
    .bind(remote_video_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(row) => Ok(row),
        None => {
            let current = get_publish_log(pool, id).await?;
            Err(DbError::InvalidPublishLogTransition {
                id,
                current_status: current.status,
            })
        }
    }
}

/// Fetches a publish log by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_publish_log(pool: &PgPool, id: i64) -> Result<PublishLogRow, DbError> {
    sqlx::query_as::<_, PublishLogRow>(
        "SELECT id, video_id, platform, status, message, remote_video_id, \
                published_at, created_at \
         FROM publish_logs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns every publish attempt for a video, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_publish_logs_for_video(
    pool: &PgPool,
    video_id: i64,
) -> Result<Vec<PublishLogRow>, DbError> {
    let rows = sqlx::query_as::<_, PublishLogRow>(
        "SELECT id, video_id, platform, status, message, remote_video_id, \
                published_at, created_at \
         FROM publish_logs \
         WHERE video_id = $1 \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(video_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
