//! Database operations for `products`.

use affvid_core::{affiliate_link, ExtractedProduct, ProductBrief, ProductMeta};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub image: Option<String>,
    /// `NUMERIC(12,2)`, never negative.
    pub price: Option<Decimal>,
    /// `NUMERIC(3,2)` within `0..=5`.
    pub rating: Option<Decimal>,
    pub affiliate_tag: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// The stored URL with the affiliate tag applied.
    #[must_use]
    pub fn affiliate_link(&self) -> String {
        affiliate_link(&self.url, self.affiliate_tag.as_deref())
    }

    #[must_use]
    pub fn brief(&self) -> ProductBrief {
        ProductBrief {
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
        }
    }

    #[must_use]
    pub fn meta(&self) -> ProductMeta {
        ProductMeta {
            title: Some(self.title.clone()),
            price: self.price,
            affiliate_link: Some(self.affiliate_link()),
        }
    }
}

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Upserts a product by its natural key.
///
/// Conflicts on `external_id` update `title`, `url`, `image`, `price`,
/// `rating`, `affiliate_tag`, `description`, and `updated_at` in place;
/// `created_at` is only ever set by the first insert. Calling this repeatedly
/// with the same record converges on one row.
///
/// Returns the full row as stored.
///
/// # Errors
///
/// Returns [`DbError::InvalidProduct`] if the title is blank, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(
    pool: &PgPool,
    product: &ExtractedProduct,
) -> Result<ProductRow, DbError> {
    if product.title.trim().is_empty() {
        return Err(DbError::InvalidProduct {
            external_id: product.external_id.clone(),
            reason: "title is empty".into(),
        });
    }

    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products \
             (external_id, title, url, image, price, rating, affiliate_tag, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (external_id) DO UPDATE SET \
             title         = EXCLUDED.title, \
             url           = EXCLUDED.url, \
             image         = EXCLUDED.image, \
             price         = EXCLUDED.price, \
             rating        = EXCLUDED.rating, \
             affiliate_tag = EXCLUDED.affiliate_tag, \
             description   = EXCLUDED.description, \
             updated_at    = NOW() \
         RETURNING id, external_id, title, url, image, price, rating, \
                   affiliate_tag, description, created_at, updated_at",
    )
    .bind(&product.external_id)
    .bind(&product.title)
    .bind(&product.url)
    .bind(&product.image)
    .bind(product.price)
    .bind(product.rating)
    .bind(&product.affiliate_tag)
    .bind(&product.description)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a product by internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(
        "SELECT id, external_id, title, url, image, price, rating, \
                affiliate_tag, description, created_at, updated_at \
         FROM products \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Point lookup by natural key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_external_id(
    pool: &PgPool,
    external_id: &str,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, external_id, title, url, image, price, rating, \
                affiliate_tag, description, created_at, updated_at \
         FROM products \
         WHERE external_id = $1",
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the number of rows in `products`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Returns products that have not yet been published successfully, oldest
/// first.
///
/// A product is pending while none of its videos has a `success` publish
/// log. Ordered by `created_at ASC, id ASC` so batch selection is
/// deterministic.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_products(pool: &PgPool, limit: i64) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT p.id, p.external_id, p.title, p.url, p.image, p.price, p.rating, \
                p.affiliate_tag, p.description, p.created_at, p.updated_at \
         FROM products p \
         WHERE NOT EXISTS ( \
             SELECT 1 \
             FROM videos v \
             JOIN publish_logs l ON l.video_id = v.id \
             WHERE v.product_id = p.id AND l.status = 'success' \
         ) \
         ORDER BY p.created_at ASC, p.id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns products with no video rows at all, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products_missing_video(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT p.id, p.external_id, p.title, p.url, p.image, p.price, p.rating, \
                p.affiliate_tag, p.description, p.created_at, p.updated_at \
         FROM products p \
         WHERE NOT EXISTS (SELECT 1 FROM videos v WHERE v.product_id = p.id) \
         ORDER BY p.created_at ASC, p.id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
