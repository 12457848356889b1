//! Pipeline batches and run history.

use affvid_core::AppConfig;
use affvid_pipeline::{Pipeline, PipelineSettings, ProductOutcome};

use crate::clients;

/// Lists the products a batch would pick up.
pub(crate) async fn preview_batch(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let products = affvid_db::list_pending_products(pool, limit).await?;
    for product in &products {
        println!("{:<16}{}", product.external_id, product.title);
    }
    println!("dry-run: would process {} product(s)", products.len());
    Ok(())
}

/// Runs one orchestrator batch and prints each product's outcome.
///
/// # Errors
///
/// Returns an error if a required API credential is missing, the run cannot
/// be tracked, or every product failed.
pub(crate) async fn run_batch(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    limit: i64,
) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(
        pool.clone(),
        clients::text_generator(config)?,
        clients::video_producer(config)?,
        clients::publisher(config)?,
        PipelineSettings::from_app_config(config),
    );
    if let Some(narrator) = clients::narrator(config)? {
        pipeline = pipeline.with_narrator(narrator);
    }

    let summary = pipeline.run_batch(limit).await?;
    if summary.outcomes.is_empty() {
        println!("no pending products; ingest some first");
        return Ok(());
    }

    for outcome in &summary.outcomes {
        match outcome {
            ProductOutcome::Published {
                external_id,
                remote_video_id,
                ..
            } => println!("  published {external_id} as {remote_video_id}"),
            ProductOutcome::Failed {
                external_id,
                stage,
                reason,
            } => println!("  failed {external_id} at {stage}: {reason}"),
        }
    }
    println!(
        "run {}: {} published, {} failed",
        summary.run_id,
        summary.published_count(),
        summary.failed_count()
    );

    if summary.run_failed {
        anyhow::bail!("all {} product(s) failed", summary.failed_count());
    }
    Ok(())
}

fn fmt_timestamp(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Prints the most recent runs, newest first.
pub(crate) async fn run_status(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = affvid_db::list_pipeline_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no runs recorded yet");
        return Ok(());
    }

    println!(
        "{:<8}{:<10}{:<11}{:<18}{:<18}{:>6}{:>8}  ERROR",
        "ID", "TYPE", "STATUS", "STARTED", "COMPLETED", "OK", "FAILED"
    );
    for run in &runs {
        println!(
            "{:<8}{:<10}{:<11}{:<18}{:<18}{:>6}{:>8}  {}",
            run.id,
            run.run_type,
            run.status,
            fmt_timestamp(run.started_at),
            fmt_timestamp(run.completed_at),
            run.records_processed,
            run.records_failed,
            run.error_message.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}
