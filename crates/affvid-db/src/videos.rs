//! Database operations for `videos`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{is_foreign_key_violation, DbError};

/// A row from the `videos` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoRow {
    pub id: i64,
    pub product_id: i64,
    pub script: String,
    /// Local path of the produced media file.
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

/// Records a produced video for an existing product.
///
/// # Errors
///
/// Returns [`DbError::InvalidVideo`] if `script` or `file_path` is empty,
/// [`DbError::ProductNotFound`] if `product_id` does not reference a row, or
/// [`DbError::Sqlx`] if the insert fails for another reason.
pub async fn create_video(
    pool: &PgPool,
    product_id: i64,
    script: &str,
    file_path: &str,
) -> Result<VideoRow, DbError> {
    if script.trim().is_empty() {
        return Err(DbError::InvalidVideo {
            product_id,
            reason: "script is empty".into(),
        });
    }
    if file_path.is_empty() {
        return Err(DbError::InvalidVideo {
            product_id,
            reason: "file path is empty".into(),
        });
    }

    sqlx::query_as::<_, VideoRow>(
        "INSERT INTO videos (product_id, script, file_path) \
         VALUES ($1, $2, $3) \
         RETURNING id, product_id, script, file_path, created_at",
    )
    .bind(product_id)
    .bind(script)
    .bind(file_path)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            DbError::ProductNotFound { product_id }
        } else {
            DbError::Sqlx(e)
        }
    })
}

/// Fetches a video by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_video(pool: &PgPool, id: i64) -> Result<VideoRow, DbError> {
    sqlx::query_as::<_, VideoRow>(
        "SELECT id, product_id, script, file_path, created_at \
         FROM videos \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns every video for a product, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_videos_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<VideoRow>, DbError> {
    let rows = sqlx::query_as::<_, VideoRow>(
        "SELECT id, product_id, script, file_path, created_at \
         FROM videos \
         WHERE product_id = $1 \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The newest video for a product that has no successful publish log.
///
/// A re-run resumes from this row instead of producing media again.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_unpublished_video(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<VideoRow>, DbError> {
    let row = sqlx::query_as::<_, VideoRow>(
        "SELECT v.id, v.product_id, v.script, v.file_path, v.created_at \
         FROM videos v \
         WHERE v.product_id = $1 \
           AND NOT EXISTS ( \
               SELECT 1 FROM publish_logs l \
               WHERE l.video_id = v.id AND l.status = 'success' \
           ) \
         ORDER BY v.created_at DESC, v.id DESC \
         LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
