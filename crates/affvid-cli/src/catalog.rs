//! Catalog population: CSV ingest, single-page scrape, marketplace search.

use std::path::Path;
use std::time::Duration;

use affvid_core::AppConfig;
use affvid_pipeline::IngestSummary;

use crate::clients;

fn print_ingest_summary(summary: &IngestSummary) {
    for failure in &summary.failed {
        println!("  skipped {}: {}", failure.source, failure.reason);
    }
    println!(
        "run {}: ingested {} product(s), {} failed",
        summary.run_id,
        summary.ingested.len(),
        summary.failed.len()
    );
}

/// Prints the URLs an ingest would fetch.
pub(crate) fn preview_ingest(csv: &Path) -> anyhow::Result<()> {
    let urls = affvid_pipeline::read_source_urls(csv)?;
    for url in &urls {
        println!("{url}");
    }
    println!("dry-run: would ingest {} url(s) from {}", urls.len(), csv.display());
    Ok(())
}

/// Scrapes every URL in `csv` and upserts the products.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read, the run cannot be tracked, or
/// every URL failed. Individual URL failures are reported, not propagated.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    csv: &Path,
) -> anyhow::Result<()> {
    let urls = affvid_pipeline::read_source_urls(csv)?;
    if urls.is_empty() {
        println!("no urls found in {}", csv.display());
        return Ok(());
    }

    let client = clients::page_client(config)?;
    let delay = Duration::from_millis(config.scraper_inter_request_delay_ms);
    let summary = affvid_pipeline::ingest_urls(pool, &client, &urls, delay).await?;

    print_ingest_summary(&summary);
    if summary.run_failed {
        anyhow::bail!("all {} url(s) failed to ingest", summary.failed.len());
    }
    Ok(())
}

/// Scrapes one product page, upserts it and prints the stored row.
pub(crate) async fn run_scrape(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    url: &str,
) -> anyhow::Result<()> {
    let client = clients::page_client(config)?;
    let product = client.scrape_product(url).await?;
    let row = affvid_db::upsert_product(pool, &product).await?;

    println!("{}", serde_json::to_string_pretty(&product)?);
    println!("stored as product {} ({})", row.id, row.external_id);
    Ok(())
}

/// Searches the marketplace and upserts every listed item.
pub(crate) async fn run_search(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    keyword: &str,
    limit: u32,
    pages: u32,
) -> anyhow::Result<()> {
    let client = clients::marketplace_client(config)?;
    let items = client.search(keyword, limit, pages).await?;
    if items.is_empty() {
        println!("no listing items found for \"{keyword}\"");
        return Ok(());
    }

    let summary = affvid_pipeline::ingest_listing(pool, &items, client.base_url()).await?;
    print_ingest_summary(&summary);
    if summary.run_failed {
        anyhow::bail!("all {} listing item(s) failed to ingest", summary.failed.len());
    }
    Ok(())
}
