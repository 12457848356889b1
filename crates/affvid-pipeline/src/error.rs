use std::path::PathBuf;

use affvid_core::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Db(#[from] affvid_db::DbError),

    #[error(transparent)]
    Scrape(#[from] affvid_scraper::ScraperError),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no \"url\" column")]
    MissingUrlColumn { path: PathBuf },

    #[error("illegal stage transition for {external_id}: {from} -> {to}")]
    IllegalTransition {
        external_id: String,
        from: Stage,
        to: Stage,
    },
}
