//! Live orchestrator tests using `#[sqlx::test]` and in-process fakes for
//! every external service.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use affvid_content::{CompletionRequest, ContentError, TextGenerator, CALL_TO_ACTION};
use affvid_core::{Analysis, ExtractedProduct, Stage};
use affvid_db::{
    get_pipeline_run, get_product_by_external_id, list_pending_products,
    list_publish_logs_for_video, list_videos_for_product, upsert_product, ProductRow,
};
use affvid_media::{MediaError, MediaRequest, SpeechSynthesizer, VideoProducer};
use affvid_pipeline::{Pipeline, PipelineSettings, ProductOutcome};
use affvid_publish::{PublishError, VideoMetadata, VideoPublisher};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Replies in order; `Err(())` simulates a failed call. Once the queue is
/// empty every call fails.
struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, ()>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(replies: Vec<Result<&str, ()>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_owned))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ContentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(())) | None => Err(ContentError::EmptyCompletion),
        }
    }
}

struct FakeProducer {
    dir: PathBuf,
    fail_for: Option<String>,
    calls: AtomicUsize,
}

impl FakeProducer {
    fn new(dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            fail_for: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing_for(dir: &Path, external_id: &str) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            fail_for: Some(external_id.to_owned()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VideoProducer for FakeProducer {
    async fn produce(&self, request: &MediaRequest) -> Result<PathBuf, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.as_deref() == Some(request.external_id.as_str()) {
            return Err(MediaError::JobFailed {
                job_id: "job-1".into(),
                payload: r#"{"status":"Fail"}"#.into(),
            });
        }
        let path = self.dir.join(format!("{}.mp4", request.external_id));
        tokio::fs::write(&path, b"fake mp4").await.unwrap();
        Ok(path)
    }
}

struct FakePublisher {
    fail: bool,
    seen: Mutex<Vec<VideoMetadata>>,
}

impl FakePublisher {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VideoPublisher for FakePublisher {
    async fn publish(
        &self,
        file_path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<String, PublishError> {
        assert!(file_path.exists(), "publisher got a missing file");
        self.seen.lock().unwrap().push(metadata.clone());
        if self.fail {
            return Err(PublishError::UnexpectedStatus {
                stage: "chunk",
                status: 500,
                body: "backend error".into(),
            });
        }
        Ok("yt-abc123".to_owned())
    }
}

struct FakeNarrator;

#[async_trait]
impl SpeechSynthesizer for FakeNarrator {
    async fn synthesize(&self, _text: &str, dest: &Path) -> Result<PathBuf, MediaError> {
        tokio::fs::write(dest, b"fake mp3").await.unwrap();
        Ok(dest.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ANALYSIS_REPLY: &str = r#"{"summary": "A sturdy widget for everyday use.",
    "keywords": ["widget", "gadget"],
    "selling_points": ["Durable", "Affordable"]}"#;
const SCRIPT_REPLY: &str = "Meet the Test Widget. Built to last.";

fn widget(external_id: &str) -> ExtractedProduct {
    ExtractedProduct {
        external_id: external_id.to_owned(),
        title: "Test Widget".to_owned(),
        url: format!("https://www.amazon.com/dp/{external_id}"),
        image: Some("https://img.test/widget.jpg".to_owned()),
        price: Some(Decimal::from_str("19.99").unwrap()),
        rating: Some(Decimal::from_str("4.5").unwrap()),
        affiliate_tag: Some("abc-20".to_owned()),
        description: None,
    }
}

async fn insert(pool: &sqlx::PgPool, external_id: &str) -> ProductRow {
    upsert_product(pool, &widget(external_id)).await.unwrap()
}

fn settings(data_dir: &Path) -> PipelineSettings {
    PipelineSettings {
        data_dir: data_dir.to_path_buf(),
        llm_model: "test-model".to_owned(),
        tone: affvid_content::Tone::default(),
        platform: "youtube".to_owned(),
        max_concurrent: 1,
        trigger_source: "test".to_owned(),
    }
}

fn pipeline(
    pool: &sqlx::PgPool,
    dir: &TempDir,
    generator: Arc<ScriptedGenerator>,
    producer: Arc<FakeProducer>,
    publisher: Arc<FakePublisher>,
) -> Pipeline {
    Pipeline::new(
        pool.clone(),
        generator,
        producer,
        publisher,
        settings(dir.path()),
    )
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn end_to_end_publishes_and_records_success(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;
    assert_eq!(product.price, Some(Decimal::from_str("19.99").unwrap()));

    let publisher = FakePublisher::ok();
    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::new(vec![Ok(ANALYSIS_REPLY), Ok(SCRIPT_REPLY)]),
        FakeProducer::new(dir.path()),
        Arc::clone(&publisher),
    );

    let summary = pipeline.run_batch(10).await.unwrap();
    assert_eq!(summary.published_count(), 1);
    assert!(!summary.run_failed);

    let ProductOutcome::Published {
        external_id,
        video_id,
        remote_video_id,
    } = &summary.outcomes[0]
    else {
        panic!("expected a published outcome, got {:?}", summary.outcomes[0]);
    };
    assert_eq!(external_id, "B0TEST0001");
    assert_eq!(remote_video_id, "yt-abc123");

    let videos = list_videos_for_product(&pool, product.id).await.unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].id, *video_id);
    assert_eq!(videos[0].script, SCRIPT_REPLY);

    let logs = list_publish_logs_for_video(&pool, *video_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "success");
    assert_eq!(logs[0].remote_video_id.as_deref(), Some("yt-abc123"));
    assert!(logs[0].published_at.is_some());

    let seen = publisher.seen.lock().unwrap();
    assert_eq!(seen[0].title, "Test Widget");
    assert!(seen[0]
        .description
        .contains("https://www.amazon.com/dp/B0TEST0001?tag=abc-20"));
    assert_eq!(seen[0].tags, vec!["widget", "gadget"]);
    drop(seen);

    let saved = std::fs::read_to_string(pipeline.analysis_path("B0TEST0001")).unwrap();
    let saved: Analysis = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved.summary, "A sturdy widget for everyday use.");
    assert_eq!(
        std::fs::read_to_string(pipeline.script_path("B0TEST0001")).unwrap(),
        SCRIPT_REPLY
    );

    let run = get_pipeline_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(run.run_type, "pipeline");
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.records_processed, 1);
    assert_eq!(run.records_failed, 0);

    assert!(list_pending_products(&pool, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_model_response_yields_empty_analysis(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;

    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::new(vec![Ok(""), Ok("")]),
        FakeProducer::new(dir.path()),
        FakePublisher::ok(),
    );

    let outcome = pipeline.process_product(&product).await;
    assert!(outcome.is_published());

    let saved = std::fs::read_to_string(pipeline.analysis_path("B0TEST0001")).unwrap();
    let saved: Analysis = serde_json::from_str(&saved).unwrap();
    assert!(saved.is_empty());

    let videos = list_videos_for_product(&pool, product.id).await.unwrap();
    assert_eq!(videos[0].script, format!("\n\n{CALL_TO_ACTION}"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_generator_falls_back_to_call_to_action(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;
    let generator = ScriptedGenerator::failing();

    let pipeline = pipeline(
        &pool,
        &dir,
        Arc::clone(&generator),
        FakeProducer::new(dir.path()),
        FakePublisher::ok(),
    );

    let outcome = pipeline.process_product(&product).await;
    assert!(outcome.is_published());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

    let videos = list_videos_for_product(&pool, product.id).await.unwrap();
    assert_eq!(videos[0].script, format!("\n\n{CALL_TO_ACTION}"));
}

// ---------------------------------------------------------------------------
// Stage failures
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn media_failure_is_tagged_and_fails_the_run(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;
    let publisher = FakePublisher::ok();

    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::new(vec![Ok(ANALYSIS_REPLY), Ok(SCRIPT_REPLY)]),
        FakeProducer::failing_for(dir.path(), "B0TEST0001"),
        Arc::clone(&publisher),
    );

    let summary = pipeline.run_batch(10).await.unwrap();
    let ProductOutcome::Failed { stage, reason, .. } = &summary.outcomes[0] else {
        panic!("expected a failed outcome");
    };
    assert_eq!(*stage, Stage::MediaProduced);
    assert!(reason.contains("job-1"), "reason was: {reason}");

    assert!(list_videos_for_product(&pool, product.id)
        .await
        .unwrap()
        .is_empty());
    assert!(publisher.seen.lock().unwrap().is_empty());

    assert!(summary.run_failed);
    let run = get_pipeline_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(run.status, "failed");
    assert!(run.error_message.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn upload_failure_writes_failed_log_and_keeps_product_pending(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;

    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::new(vec![Ok(ANALYSIS_REPLY), Ok(SCRIPT_REPLY)]),
        FakeProducer::new(dir.path()),
        FakePublisher::failing(),
    );

    let outcome = pipeline.process_product(&product).await;
    let ProductOutcome::Failed { stage, reason, .. } = outcome else {
        panic!("expected a failed outcome");
    };
    assert_eq!(stage, Stage::Published);
    assert!(reason.contains("500"), "reason was: {reason}");

    let videos = list_videos_for_product(&pool, product.id).await.unwrap();
    assert_eq!(videos.len(), 1);
    let logs = list_publish_logs_for_video(&pool, videos[0].id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "failed");
    assert!(logs[0].message.as_deref().is_some_and(|m| !m.is_empty()));
    assert!(logs[0].published_at.is_none());

    let pending = list_pending_products(&pool, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rerun_resumes_from_unpublished_video(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;

    let first = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::new(vec![Ok(ANALYSIS_REPLY), Ok(SCRIPT_REPLY)]),
        FakeProducer::new(dir.path()),
        FakePublisher::failing(),
    );
    assert!(!first.process_product(&product).await.is_published());

    let generator = ScriptedGenerator::failing();
    let producer = FakeProducer::new(dir.path());
    let publisher = FakePublisher::ok();
    let second = pipeline(
        &pool,
        &dir,
        Arc::clone(&generator),
        Arc::clone(&producer),
        Arc::clone(&publisher),
    );

    let outcome = second.process_product(&product).await;
    assert!(outcome.is_published(), "got {outcome:?}");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(producer.calls.load(Ordering::SeqCst), 0);

    let videos = list_videos_for_product(&pool, product.id).await.unwrap();
    assert_eq!(videos.len(), 1);
    let logs = list_publish_logs_for_video(&pool, videos[0].id).await.unwrap();
    let statuses: Vec<&str> = logs.iter().map(|l| l.status.as_str()).collect();
    assert_eq!(statuses, vec!["failed", "success"]);

    // The saved analysis from the first run still feeds the metadata.
    let seen = publisher.seen.lock().unwrap();
    assert_eq!(seen[0].tags, vec!["widget", "gadget"]);
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn one_failed_product_does_not_abort_the_batch(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    insert(&pool, "B0TEST0001").await;
    insert(&pool, "B0TEST0002").await;

    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::failing(),
        FakeProducer::failing_for(dir.path(), "B0TEST0001"),
        FakePublisher::ok(),
    );

    let summary = pipeline.run_batch(10).await.unwrap();
    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.published_count(), 1);
    assert_eq!(summary.failed_count(), 1);
    assert!(!summary.run_failed);

    let run = get_pipeline_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.records_processed, 1);
    assert_eq!(run.records_failed, 1);

    let pending = list_pending_products(&pool, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].external_id, "B0TEST0001");
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_batch_completes_the_run(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::failing(),
        FakeProducer::new(dir.path()),
        FakePublisher::ok(),
    );

    let summary = pipeline.run_batch(10).await.unwrap();
    assert!(summary.outcomes.is_empty());
    assert!(!summary.run_failed);

    let run = get_pipeline_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.records_processed, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn batch_limit_caps_products_processed(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    for id in ["B0TEST0001", "B0TEST0002", "B0TEST0003"] {
        insert(&pool, id).await;
    }

    let mut settings = settings(dir.path());
    settings.max_concurrent = 2;
    let pipeline = Pipeline::new(
        pool.clone(),
        ScriptedGenerator::failing(),
        FakeProducer::new(dir.path()),
        FakePublisher::ok(),
        settings,
    );

    let summary = pipeline.run_batch(2).await.unwrap();
    assert_eq!(summary.published_count(), 2);
    assert_eq!(list_pending_products(&pool, 10).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn narration_is_written_when_enabled(pool: sqlx::PgPool) {
    let dir = TempDir::new().unwrap();
    let product = insert(&pool, "B0TEST0001").await;

    let pipeline = pipeline(
        &pool,
        &dir,
        ScriptedGenerator::new(vec![Ok(ANALYSIS_REPLY), Ok(SCRIPT_REPLY)]),
        FakeProducer::new(dir.path()),
        FakePublisher::ok(),
    )
    .with_narrator(Arc::new(FakeNarrator));

    assert!(pipeline.process_product(&product).await.is_published());
    assert!(pipeline.narration_path("B0TEST0001").exists());

    let stored = get_product_by_external_id(&pool, "B0TEST0001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, product.id);
}
