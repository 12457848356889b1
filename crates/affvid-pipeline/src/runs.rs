//! Run bookkeeping shared by the orchestrator and ingestion.

use std::fmt::Display;
use std::future::Future;

use sqlx::PgPool;

use crate::error::PipelineError;

pub(crate) fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Marks a run failed, logging instead of propagating a second error.
pub(crate) async fn fail_run_best_effort(
    pool: &PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = affvid_db::fail_pipeline_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}

/// Runs `op`, trying a second time if the first attempt fails.
pub(crate) async fn retry_once<T, E, F, Fut>(context: &'static str, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "{context} failed; retrying once");
            op().await
        }
    }
}

/// Closes a running run: failed when nothing succeeded and something failed,
/// succeeded otherwise.
///
/// Returns `true` when the run was marked failed.
pub(crate) async fn finish_run(
    pool: &PgPool,
    run_id: i64,
    context: &'static str,
    succeeded: usize,
    failed: usize,
) -> Result<bool, PipelineError> {
    if failed > 0 {
        tracing::warn!(run_id, succeeded, failed, "some {context} items failed");
    }

    if succeeded == 0 && failed > 0 {
        let message = format!("all {failed} {context} items failed");
        fail_run_best_effort(pool, run_id, context, message).await;
        return Ok(true);
    }

    if let Err(e) =
        affvid_db::complete_pipeline_run(pool, run_id, count_i32(succeeded), count_i32(failed))
            .await
    {
        fail_run_best_effort(pool, run_id, context, e.to_string()).await;
        return Err(e.into());
    }

    Ok(false)
}
