//! Per-product orchestration of analysis, scripting, rendering and
//! publishing, plus bulk ingestion into the catalog.

pub mod error;
pub mod ingest;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
mod runs;

pub use error::PipelineError;
pub use ingest::{ingest_listing, ingest_urls, read_source_urls, IngestFailure, IngestSummary};
pub use metadata::{build_description, build_tags, build_video_metadata};
pub use orchestrator::{
    BatchSummary, Pipeline, PipelineSettings, ProductOutcome, DEFAULT_TRIGGER_SOURCE,
};
pub use progress::ProductProgress;
