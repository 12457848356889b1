//! Bulk ingestion of product pages and marketplace listings into the catalog.

use std::path::Path;
use std::time::Duration;

use affvid_db::ProductRow;
use affvid_scraper::{extract_from_payload, ListingItem, PageClient};
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::orchestrator::DEFAULT_TRIGGER_SOURCE;
use crate::runs::{fail_run_best_effort, finish_run};

const RUN_TYPE: &str = "ingest";

/// One source that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    /// The URL or listing id that failed.
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub run_id: i64,
    /// External ids upserted, in input order.
    pub ingested: Vec<String>,
    pub failed: Vec<IngestFailure>,
    /// The run was marked failed because no source got through.
    pub run_failed: bool,
}

impl IngestSummary {
    fn new(run_id: i64) -> Self {
        Self {
            run_id,
            ingested: Vec::new(),
            failed: Vec::new(),
            run_failed: false,
        }
    }

    fn record(&mut self, source: &str, result: Result<ProductRow, PipelineError>) {
        match result {
            Ok(row) => {
                tracing::info!(external_id = %row.external_id, source, "product ingested");
                self.ingested.push(row.external_id);
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "product skipped");
                self.failed.push(IngestFailure {
                    source: source.to_owned(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Reads the `url` column of a CSV file.
///
/// The header match is case-insensitive; rows whose `url` cell is blank
/// or missing are skipped.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the file cannot be read or parsed, or
/// [`PipelineError::MissingUrlColumn`] if no header is named `url`.
pub fn read_source_urls(path: &Path) -> Result<Vec<String>, PipelineError> {
    let csv_err = |source: csv::Error| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let column = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.eq_ignore_ascii_case("url"))
        .ok_or_else(|| PipelineError::MissingUrlColumn {
            path: path.to_path_buf(),
        })?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        match record.get(column) {
            Some(url) if !url.is_empty() => urls.push(url.to_owned()),
            _ => tracing::debug!(
                line = ?record.position().map(csv::Position::line),
                "blank url row skipped"
            ),
        }
    }

    Ok(urls)
}

async fn start_ingest_run(pool: &PgPool) -> Result<i64, PipelineError> {
    let run = affvid_db::create_pipeline_run(pool, RUN_TYPE, DEFAULT_TRIGGER_SOURCE).await?;
    if let Err(e) = affvid_db::start_pipeline_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, RUN_TYPE, e.to_string()).await;
        return Err(e.into());
    }
    Ok(run.id)
}

async fn finish_ingest_run(
    pool: &PgPool,
    mut summary: IngestSummary,
) -> Result<IngestSummary, PipelineError> {
    summary.run_failed = finish_run(
        pool,
        summary.run_id,
        RUN_TYPE,
        summary.ingested.len(),
        summary.failed.len(),
    )
    .await?;
    Ok(summary)
}

/// Scrapes each URL and upserts the result, pausing `delay` between
/// requests.
///
/// Each URL is processed independently: a failure is logged with the URL
/// and reason and the next URL is attempted.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] only for run bookkeeping failures.
pub async fn ingest_urls(
    pool: &PgPool,
    client: &PageClient,
    urls: &[String],
    delay: Duration,
) -> Result<IngestSummary, PipelineError> {
    let mut summary = IngestSummary::new(start_ingest_run(pool).await?);

    for (i, url) in urls.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result: Result<ProductRow, PipelineError> = async {
            let product = client.scrape_product(url).await?;
            Ok(affvid_db::upsert_product(pool, &product).await?)
        }
        .await;
        summary.record(url, result);
    }

    finish_ingest_run(pool, summary).await
}

/// Upserts marketplace listing items resolved against `base_url`.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] only for run bookkeeping failures.
pub async fn ingest_listing(
    pool: &PgPool,
    items: &[ListingItem],
    base_url: &str,
) -> Result<IngestSummary, PipelineError> {
    let mut summary = IngestSummary::new(start_ingest_run(pool).await?);

    for item in items {
        let source = item
            .id
            .map_or_else(|| "(no id)".to_owned(), |id| id.to_string());
        let result: Result<ProductRow, PipelineError> = async {
            let product = extract_from_payload(item, base_url)?;
            Ok(affvid_db::upsert_product(pool, &product).await?)
        }
        .await;
        summary.record(&source, result);
    }

    finish_ingest_run(pool, summary).await
}
