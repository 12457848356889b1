//! Live integration tests for affvid-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. `"../../migrations"` resolves to the workspace
//! migration directory.

use affvid_core::ExtractedProduct;
use affvid_db::{
    complete_pipeline_run, count_products, create_pipeline_run, create_publish_log, create_video,
    fail_pipeline_run, finish_publish_log, get_pipeline_run, get_product,
    get_product_by_external_id, get_publish_log, latest_unpublished_video, list_pending_products,
    list_pipeline_runs, list_products_missing_video, list_publish_logs_for_video,
    list_videos_for_product, start_pipeline_run, upsert_product, DbError, PublishOutcome,
    DEFAULT_PLATFORM,
};
use rust_decimal::Decimal;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_product(external_id: &str) -> ExtractedProduct {
    ExtractedProduct {
        external_id: external_id.to_string(),
        title: "Test Widget".to_string(),
        url: format!("https://www.amazon.com/dp/{external_id}"),
        image: Some("https://m.media-amazon.com/images/I/widget.jpg".to_string()),
        price: Some(Decimal::from_str("19.99").unwrap()),
        rating: Some(Decimal::from_str("4.5").unwrap()),
        affiliate_tag: None,
        description: None,
    }
}

async fn insert_product(pool: &sqlx::PgPool, external_id: &str) -> i64 {
    upsert_product(pool, &make_product(external_id))
        .await
        .unwrap_or_else(|e| panic!("upsert_product failed for '{external_id}': {e}"))
        .id
}

// ---------------------------------------------------------------------------
// Section 1: Products
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_product_is_idempotent(pool: sqlx::PgPool) {
    let product = make_product("B0TEST0001");

    let first = upsert_product(&pool, &product).await.expect("first upsert");
    let second = upsert_product(&pool, &product).await.expect("second upsert");

    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(count_products(&pool).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_product_overwrites_scraped_fields(pool: sqlx::PgPool) {
    let mut product = make_product("B0TEST0001");
    upsert_product(&pool, &product).await.unwrap();

    product.title = "Test Widget v2".to_string();
    product.price = Some(Decimal::from_str("17.50").unwrap());
    product.rating = None;
    upsert_product(&pool, &product).await.unwrap();

    let stored = get_product_by_external_id(&pool, "B0TEST0001")
        .await
        .unwrap()
        .expect("product should exist");
    assert_eq!(stored.title, "Test Widget v2");
    assert_eq!(stored.price, Some(Decimal::from_str("17.50").unwrap()));
    assert!(stored.rating.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_product_rejects_blank_title(pool: sqlx::PgPool) {
    let mut product = make_product("B0TEST0001");
    product.title = "   ".to_string();

    let err = upsert_product(&pool, &product).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidProduct { .. }));
    assert_eq!(count_products(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_product_missing_returns_not_found(pool: sqlx::PgPool) {
    let err = get_product(&pool, 9_999).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
    assert!(get_product_by_external_id(&pool, "NOPE").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Section 2: Videos
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_video_for_missing_product_fails(pool: sqlx::PgPool) {
    let err = create_video(&pool, 9_999, "script", "output/x.mp4")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ProductNotFound { product_id: 9_999 }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_video_rejects_empty_script(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "B0TEST0001").await;
    let err = create_video(&pool, product_id, "", "output/x.mp4")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidVideo { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_videos_for_product_returns_oldest_first(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "B0TEST0001").await;
    let first = create_video(&pool, product_id, "one", "output/1.mp4")
        .await
        .unwrap();
    let second = create_video(&pool, product_id, "two", "output/2.mp4")
        .await
        .unwrap();

    let videos = list_videos_for_product(&pool, product_id).await.unwrap();
    let ids: Vec<i64> = videos.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

// ---------------------------------------------------------------------------
// Section 3: Publish logs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn publish_log_moves_to_success_once(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "B0TEST0001").await;
    let video = create_video(&pool, product_id, "script", "output/B0TEST0001.mp4")
        .await
        .unwrap();

    let log = create_publish_log(&pool, video.id, DEFAULT_PLATFORM)
        .await
        .unwrap();
    assert_eq!(log.status, "pending");
    assert!(log.published_at.is_none());

    let finished = finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Success {
            remote_video_id: "yt-123".to_string(),
            message: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(finished.status, "success");
    assert!(finished.published_at.is_some());
    assert_eq!(finished.remote_video_id.as_deref(), Some("yt-123"));

    let err = finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Failed {
            message: "late failure".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidPublishLogTransition { ref current_status, .. } if current_status == "success"
    ));

    let reread = get_publish_log(&pool, log.id).await.unwrap();
    assert_eq!(reread.status, "success");
    assert!(reread.message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_publish_requires_message(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "B0TEST0001").await;
    let video = create_video(&pool, product_id, "script", "output/a.mp4")
        .await
        .unwrap();
    let log = create_publish_log(&pool, video.id, DEFAULT_PLATFORM)
        .await
        .unwrap();

    let err = finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Failed {
            message: " ".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::MissingFailureMessage { .. }));

    let failed = finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Failed {
            message: "quota exceeded".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(failed.status, "failed");
    assert!(failed.published_at.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn finish_missing_publish_log_returns_not_found(pool: sqlx::PgPool) {
    let err = finish_publish_log(
        &pool,
        9_999,
        &PublishOutcome::Failed {
            message: "boom".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_publish_log_for_missing_video_fails(pool: sqlx::PgPool) {
    let err = create_publish_log(&pool, 9_999, DEFAULT_PLATFORM)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::VideoNotFound { video_id: 9_999 }));
}

// ---------------------------------------------------------------------------
// Section 4: Batch selection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn pending_products_exclude_successfully_published(pool: sqlx::PgPool) {
    let published = insert_product(&pool, "B0TEST0001").await;
    let failed = insert_product(&pool, "B0TEST0002").await;
    let fresh = insert_product(&pool, "B0TEST0003").await;

    let video = create_video(&pool, published, "s", "output/1.mp4")
        .await
        .unwrap();
    let log = create_publish_log(&pool, video.id, DEFAULT_PLATFORM)
        .await
        .unwrap();
    finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Success {
            remote_video_id: "yt-1".to_string(),
            message: None,
        },
    )
    .await
    .unwrap();

    let video = create_video(&pool, failed, "s", "output/2.mp4")
        .await
        .unwrap();
    let log = create_publish_log(&pool, video.id, DEFAULT_PLATFORM)
        .await
        .unwrap();
    finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Failed {
            message: "upload rejected".to_string(),
        },
    )
    .await
    .unwrap();

    let pending: Vec<i64> = list_pending_products(&pool, 10)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(pending, vec![failed, fresh]);

    let missing_video: Vec<i64> = list_products_missing_video(&pool, 10)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(missing_video, vec![fresh]);

    let limited = list_pending_products(&pool, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, failed);
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_unpublished_video_skips_published(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "B0TEST0001").await;
    assert!(latest_unpublished_video(&pool, product_id)
        .await
        .unwrap()
        .is_none());

    let video = create_video(&pool, product_id, "s", "output/1.mp4")
        .await
        .unwrap();
    let found = latest_unpublished_video(&pool, product_id)
        .await
        .unwrap()
        .expect("unpublished video");
    assert_eq!(found.id, video.id);

    let log = create_publish_log(&pool, video.id, DEFAULT_PLATFORM)
        .await
        .unwrap();
    finish_publish_log(
        &pool,
        log.id,
        &PublishOutcome::Success {
            remote_video_id: "yt-1".to_string(),
            message: None,
        },
    )
    .await
    .unwrap();

    assert!(latest_unpublished_video(&pool, product_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        list_publish_logs_for_video(&pool, video.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// Section 5: Pipeline run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "pipeline", "cli").await.unwrap();
    assert_eq!(run.status, "queued");

    start_pipeline_run(&pool, run.id).await.unwrap();
    complete_pipeline_run(&pool, run.id, 3, 1).await.unwrap();

    let row = get_pipeline_run(&pool, run.id).await.unwrap();
    assert_eq!(row.status, "succeeded");
    assert_eq!(row.records_processed, 3);
    assert_eq!(row.records_failed, 1);
    assert!(row.started_at.is_some());
    assert!(row.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_rejects_out_of_order_transitions(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "ingest", "cli").await.unwrap();

    let err = complete_pipeline_run(&pool, run.id, 0, 0).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidPipelineRunTransition {
            expected_status: "running",
            ..
        }
    ));

    start_pipeline_run(&pool, run.id).await.unwrap();
    fail_pipeline_run(&pool, run.id, "boom").await.unwrap();

    let err = start_pipeline_run(&pool, run.id).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidPipelineRunTransition { .. }));

    let runs = list_pipeline_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].error_message.as_deref(), Some("boom"));
}
