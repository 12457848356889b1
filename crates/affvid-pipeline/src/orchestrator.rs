//! Drives each pending product through analysis, scripting, rendering and
//! publishing.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use affvid_content::{
    load_analysis, save_analysis, save_script, Analyzer, ScriptWriter, TextGenerator, Tone,
};
use affvid_core::{Analysis, AppConfig, Stage};
use affvid_db::{ProductRow, PublishOutcome, VideoRow};
use affvid_media::{MediaRequest, SpeechSynthesizer, VideoProducer};
use affvid_publish::VideoPublisher;
use futures::stream::{self, StreamExt};
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::metadata::build_video_metadata;
use crate::progress::ProductProgress;
use crate::runs::{fail_run_best_effort, finish_run, retry_once};

pub const DEFAULT_TRIGGER_SOURCE: &str = "cli";
const RUN_TYPE: &str = "pipeline";

/// Knobs for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Where analysis, script and narration artifacts are written.
    pub data_dir: PathBuf,
    pub llm_model: String,
    pub tone: Tone,
    pub platform: String,
    /// Products in flight at once; `1` is strictly sequential.
    pub max_concurrent: usize,
    pub trigger_source: String,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            llm_model: config.llm_model.clone(),
            tone: Tone::default(),
            platform: affvid_db::DEFAULT_PLATFORM.to_owned(),
            max_concurrent: config.max_concurrent_products,
            trigger_source: DEFAULT_TRIGGER_SOURCE.to_owned(),
        }
    }
}

/// How one product's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    Published {
        external_id: String,
        video_id: i64,
        remote_video_id: String,
    },
    /// `stage` is the stage that could not be reached.
    Failed {
        external_id: String,
        stage: Stage,
        reason: String,
    },
}

impl ProductOutcome {
    #[must_use]
    pub fn external_id(&self) -> &str {
        match self {
            ProductOutcome::Published { external_id, .. }
            | ProductOutcome::Failed { external_id, .. } => external_id,
        }
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, ProductOutcome::Published { .. })
    }
}

/// Result of [`Pipeline::run_batch`].
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub run_id: i64,
    pub outcomes: Vec<ProductOutcome>,
    /// The run was marked failed because no product got through.
    pub run_failed: bool,
}

impl BatchSummary {
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.published_count()
    }
}

struct StageFailure {
    stage: Stage,
    reason: String,
}

fn failed_at<E: Display>(stage: Stage) -> impl FnOnce(E) -> StageFailure {
    move |e| StageFailure {
        stage,
        reason: e.to_string(),
    }
}

fn advance(progress: &mut ProductProgress, to: Stage) -> Result<(), StageFailure> {
    progress.advance(to).map_err(failed_at::<PipelineError>(to))
}

/// The per-product state machine plus its collaborators.
///
/// Collaborators are injected as trait objects so that tests can substitute
/// fakes for every external service.
pub struct Pipeline {
    pool: PgPool,
    analyzer: Analyzer,
    writer: ScriptWriter,
    producer: Arc<dyn VideoProducer>,
    publisher: Arc<dyn VideoPublisher>,
    narrator: Option<Arc<dyn SpeechSynthesizer>>,
    settings: PipelineSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        pool: PgPool,
        generator: Arc<dyn TextGenerator>,
        producer: Arc<dyn VideoProducer>,
        publisher: Arc<dyn VideoPublisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            pool,
            analyzer: Analyzer::new(Arc::clone(&generator), settings.llm_model.clone()),
            writer: ScriptWriter::new(generator, settings.llm_model.clone()),
            producer,
            publisher,
            narrator: None,
            settings,
        }
    }

    /// Enables narration audio for every scripted product.
    #[must_use]
    pub fn with_narrator(mut self, narrator: Arc<dyn SpeechSynthesizer>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    #[must_use]
    pub fn analysis_path(&self, external_id: &str) -> PathBuf {
        self.settings
            .data_dir
            .join(format!("analysis_{external_id}.json"))
    }

    #[must_use]
    pub fn script_path(&self, external_id: &str) -> PathBuf {
        self.settings.data_dir.join(format!("script_{external_id}.txt"))
    }

    #[must_use]
    pub fn narration_path(&self, external_id: &str) -> PathBuf {
        self.settings
            .data_dir
            .join(format!("narration_{external_id}.mp3"))
    }

    /// Processes up to `limit` products that have never been published.
    ///
    /// The batch is tracked as a `pipeline` run. A product failure never
    /// aborts the batch; the run is marked failed only when every product
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Db`] if the run cannot be created, started or
    /// completed, or if pending products cannot be listed.
    pub async fn run_batch(&self, limit: i64) -> Result<BatchSummary, PipelineError> {
        let run =
            affvid_db::create_pipeline_run(&self.pool, RUN_TYPE, &self.settings.trigger_source)
                .await?;
        if let Err(e) = affvid_db::start_pipeline_run(&self.pool, run.id).await {
            fail_run_best_effort(&self.pool, run.id, RUN_TYPE, e.to_string()).await;
            return Err(e.into());
        }

        let products = match affvid_db::list_pending_products(&self.pool, limit).await {
            Ok(products) => products,
            Err(e) => {
                fail_run_best_effort(&self.pool, run.id, RUN_TYPE, e.to_string()).await;
                return Err(e.into());
            }
        };

        let max_concurrent = self.settings.max_concurrent.max(1);
        tracing::info!(
            run_id = run.id,
            products = products.len(),
            max_concurrent,
            "pipeline batch started"
        );

        let outcomes: Vec<ProductOutcome> = stream::iter(&products)
            .map(|product| self.process_product(product))
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        let mut summary = BatchSummary {
            run_id: run.id,
            outcomes,
            run_failed: false,
        };
        summary.run_failed = finish_run(
            &self.pool,
            run.id,
            RUN_TYPE,
            summary.published_count(),
            summary.failed_count(),
        )
        .await?;

        tracing::info!(
            run_id = run.id,
            published = summary.published_count(),
            failed = summary.failed_count(),
            "pipeline batch finished"
        );
        Ok(summary)
    }

    /// Runs one product through the remaining stages.
    ///
    /// A product with a produced but unpublished video resumes at the publish
    /// step instead of generating a new one. Errors are caught here and
    /// reported as [`ProductOutcome::Failed`] tagged with the stage.
    pub async fn process_product(&self, product: &ProductRow) -> ProductOutcome {
        let mut progress = ProductProgress::new(&product.external_id);

        match self.run_stages(product, &mut progress).await {
            Ok((video_id, remote_video_id)) => {
                tracing::info!(
                    external_id = %product.external_id,
                    video_id,
                    remote_video_id = %remote_video_id,
                    "product published"
                );
                ProductOutcome::Published {
                    external_id: product.external_id.clone(),
                    video_id,
                    remote_video_id,
                }
            }
            Err(failure) => {
                tracing::warn!(
                    external_id = %product.external_id,
                    stage = %failure.stage,
                    reason = %failure.reason,
                    "product failed"
                );
                ProductOutcome::Failed {
                    external_id: product.external_id.clone(),
                    stage: failure.stage,
                    reason: failure.reason,
                }
            }
        }
    }

    async fn run_stages(
        &self,
        product: &ProductRow,
        progress: &mut ProductProgress,
    ) -> Result<(i64, String), StageFailure> {
        let checkpoint = affvid_db::latest_unpublished_video(&self.pool, product.id)
            .await
            .map_err(failed_at(progress.attempting()))?;

        let (video, analysis) = if let Some(video) = checkpoint {
            tracing::info!(
                external_id = %product.external_id,
                video_id = video.id,
                "resuming from unpublished video"
            );
            *progress = ProductProgress::resumed(&product.external_id, Stage::MediaProduced);
            let analysis = self.load_saved_analysis(&product.external_id).await;
            (video, analysis)
        } else {
            let analysis = self.analyze(product).await;
            advance(progress, Stage::Analyzed)?;

            let script = self.script(product, &analysis).await;
            advance(progress, Stage::Scripted)?;

            let video = self.produce(product, script).await?;
            advance(progress, Stage::MediaProduced)?;
            (video, analysis)
        };

        let remote_video_id = self.publish(product, &video, &analysis).await?;
        advance(progress, Stage::Published)?;
        advance(progress, Stage::Done)?;

        Ok((video.id, remote_video_id))
    }

    async fn analyze(&self, product: &ProductRow) -> Analysis {
        let analysis = self.analyzer.analyze(&product.brief()).await;
        let path = self.analysis_path(&product.external_id);
        if let Err(e) = save_analysis(&analysis, &path).await {
            tracing::warn!(external_id = %product.external_id, error = %e, "analysis not saved");
        }
        analysis
    }

    async fn load_saved_analysis(&self, external_id: &str) -> Analysis {
        match load_analysis(&self.analysis_path(external_id)).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::debug!(external_id, error = %e, "no saved analysis; publishing without one");
                Analysis::default()
            }
        }
    }

    async fn script(&self, product: &ProductRow, analysis: &Analysis) -> String {
        let script = self
            .writer
            .write_script(analysis, &product.meta(), self.settings.tone)
            .await;

        let path = self.script_path(&product.external_id);
        if let Err(e) = save_script(&script, &path).await {
            tracing::warn!(external_id = %product.external_id, error = %e, "script not saved");
        }

        if let Some(narrator) = &self.narrator {
            let dest = self.narration_path(&product.external_id);
            match narrator.synthesize(&script, &dest).await {
                Ok(path) => tracing::info!(
                    external_id = %product.external_id,
                    path = %path.display(),
                    "narration synthesized"
                ),
                Err(e) => tracing::warn!(
                    external_id = %product.external_id,
                    error = %e,
                    "narration skipped"
                ),
            }
        }

        script
    }

    async fn produce(&self, product: &ProductRow, script: String) -> Result<VideoRow, StageFailure> {
        let request = MediaRequest {
            external_id: product.external_id.clone(),
            script,
            image_url: product.image.clone(),
        };
        let path = self
            .producer
            .produce(&request)
            .await
            .map_err(failed_at(Stage::MediaProduced))?;

        affvid_db::create_video(
            &self.pool,
            product.id,
            &request.script,
            &path.to_string_lossy(),
        )
        .await
        .map_err(failed_at(Stage::MediaProduced))
    }

    async fn publish(
        &self,
        product: &ProductRow,
        video: &VideoRow,
        analysis: &Analysis,
    ) -> Result<String, StageFailure> {
        let log = affvid_db::create_publish_log(&self.pool, video.id, &self.settings.platform)
            .await
            .map_err(failed_at(Stage::Published))?;

        let metadata = build_video_metadata(product, analysis);
        match self
            .publisher
            .publish(Path::new(&video.file_path), &metadata)
            .await
        {
            Ok(remote_video_id) => {
                let outcome = PublishOutcome::Success {
                    remote_video_id: remote_video_id.clone(),
                    message: None,
                };
                let (pool, outcome, log_id) = (&self.pool, &outcome, log.id);
                let recorded = retry_once("publish log update", move || {
                    affvid_db::finish_publish_log(pool, log_id, outcome)
                })
                .await;
                if let Err(e) = recorded {
                    tracing::error!(
                        external_id = %product.external_id,
                        publish_log_id = log_id,
                        remote_video_id = %remote_video_id,
                        error = %e,
                        "video uploaded but publish log left pending"
                    );
                    return Err(StageFailure {
                        stage: Stage::Published,
                        reason: format!("uploaded as {remote_video_id} but log not updated: {e}"),
                    });
                }
                Ok(remote_video_id)
            }
            Err(e) => {
                let reason = e.to_string();
                let outcome = PublishOutcome::Failed {
                    message: reason.clone(),
                };
                if let Err(log_err) =
                    affvid_db::finish_publish_log(&self.pool, log.id, &outcome).await
                {
                    tracing::error!(
                        external_id = %product.external_id,
                        publish_log_id = log.id,
                        error = %log_err,
                        "failed to record failed upload"
                    );
                }
                Err(StageFailure {
                    stage: Stage::Published,
                    reason,
                })
            }
        }
    }
}
