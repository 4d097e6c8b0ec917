//! Worker loop: discovers due posts and uploads them
//!
//! Each discovery cycle selects every `pending` post whose scheduled time has
//! passed, then handles them one at a time: claim, upload, record the
//! outcome. A post the worker fails to claim (another worker won the race,
//! or the post changed state since discovery) is skipped, never uploaded.
//!
//! Failures are contained at two levels:
//! - a store failure during discovery aborts the whole cycle; the next tick
//!   starts over
//! - anything that goes wrong while handling one post (upload error or
//!   panic) is written onto that post as `error` and the cycle moves on

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::{Result, UploadError};
use crate::platforms::{UploadRequest, Uploader};
use crate::types::ScheduledPost;

/// Counts from one discovery cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Due posts returned by the discovery query
    pub discovered: usize,
    /// Posts this worker claimed
    pub claimed: usize,
    /// Due posts another worker got first
    pub skipped: usize,
    pub posted: usize,
    pub failed: usize,
}

pub struct Worker {
    db: Database,
    uploader: Arc<dyn Uploader>,
    delete_after_upload: bool,
}

impl Worker {
    pub fn new(db: Database, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            db,
            uploader,
            delete_after_upload: true,
        }
    }

    /// Keep or remove the local file after a successful upload (default: remove)
    pub fn delete_after_upload(mut self, delete: bool) -> Self {
        self.delete_after_upload = delete;
        self
    }

    /// Run one discovery cycle against the current time
    pub async fn check_and_post_videos(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one discovery cycle as if the clock read `now`
    ///
    /// # Errors
    ///
    /// Returns a database error when the discovery query fails. Nothing is
    /// claimed in that case.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let due_posts = self.db.get_due_posts(now).await?;

        let mut report = CycleReport {
            discovered: due_posts.len(),
            ..Default::default()
        };

        if due_posts.is_empty() {
            return Ok(report);
        }

        info!("Found {} post(s) due for upload", due_posts.len());

        for post in due_posts {
            match self.db.claim_post(post.id, now).await {
                Ok(true) => {
                    report.claimed += 1;
                    self.process_post(&post, &mut report).await;
                }
                Ok(false) => {
                    debug!(post_id = post.id, "Post already claimed elsewhere, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(post_id = post.id, error = %e, "Could not claim post");
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    async fn upload(&self, post: &ScheduledPost) -> std::result::Result<String, UploadError> {
        let request = UploadRequest::from(post);
        self.uploader.upload(&request).await
    }

    /// Upload a claimed post and record the outcome on it
    async fn process_post(&self, post: &ScheduledPost, report: &mut CycleReport) {
        info!(
            post_id = post.id,
            platform = self.uploader.name(),
            title = %post.title,
            "Uploading post"
        );

        let attempt = AssertUnwindSafe(self.upload(post)).catch_unwind().await;

        let outcome = match attempt {
            Ok(Ok(posted_id)) => Ok(posted_id),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(format!("Worker error: {}", panic_message(panic.as_ref()))),
        };

        match outcome {
            Ok(posted_id) => match self.db.mark_posted(post.id, &posted_id).await {
                Ok(()) => {
                    report.posted += 1;
                    info!(post_id = post.id, posted_id = %posted_id, status = "posted", "Upload complete");
                    if self.delete_after_upload {
                        remove_video(post.id, Path::new(&post.video_path)).await;
                    }
                }
                Err(e) => {
                    // The video is live but the record stays in processing
                    error!(
                        post_id = post.id,
                        posted_id = %posted_id,
                        error = %e,
                        "Upload succeeded but the post could not be marked posted"
                    );
                }
            },
            Err(message) => match self.db.mark_error(post.id, &message).await {
                Ok(()) => {
                    report.failed += 1;
                    warn!(post_id = post.id, status = "error", error = %message, "Upload failed");
                }
                Err(e) => {
                    error!(
                        post_id = post.id,
                        error = %e,
                        upload_error = %message,
                        "Upload failed and the post could not be marked as error"
                    );
                }
            },
        }
    }

    /// Run cycles until `shutdown` is set
    ///
    /// Cycles never overlap: the next one starts `poll_interval` after the
    /// previous one finished. A failed cycle is logged and retried on the
    /// next tick. The flag is checked at least once a second while idle; a
    /// post already being uploaded is finished first.
    pub async fn run(&self, poll_interval: Duration, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping worker loop");
                break;
            }

            match self.check_and_post_videos().await {
                Ok(report) if report.discovered > 0 => {
                    info!(
                        discovered = report.discovered,
                        claimed = report.claimed,
                        skipped = report.skipped,
                        posted = report.posted,
                        failed = report.failed,
                        "Cycle complete"
                    );
                }
                Ok(_) => debug!("No posts due"),
                Err(e) => error!(error = %e, "Discovery cycle failed, retrying next tick"),
            }

            // Sleep until next poll (check shutdown every second)
            let mut remaining = poll_interval;
            while !remaining.is_zero() {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let step = remaining.min(Duration::from_secs(1));
                sleep(step).await;
                remaining -= step;
            }
        }
    }
}

async fn remove_video(post_id: i64, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(post_id, path = %path.display(), "Removed uploaded video"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(post_id, path = %path.display(), error = %e, "Could not remove uploaded video"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockUploader;
    use crate::types::{
        NewScheduledPost, PostStatus, PrivacyStatus, DEFAULT_CATEGORY_ID, PLATFORM_YOUTUBE,
    };
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        db: Database,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("worker.db").to_str().unwrap())
            .await
            .unwrap();
        Fixture { dir, db }
    }

    impl Fixture {
        async fn schedule(&self, name: &str, at: DateTime<Utc>) -> (i64, std::path::PathBuf) {
            let video = self.dir.path().join(format!("{}.mp4", name));
            std::fs::write(&video, b"fake video").unwrap();
            let id = self
                .db
                .create_post(&NewScheduledPost {
                    platform: PLATFORM_YOUTUBE.to_string(),
                    video_path: video.to_string_lossy().to_string(),
                    title: name.to_string(),
                    description: None,
                    tags: vec!["a".to_string()],
                    category_id: DEFAULT_CATEGORY_ID.to_string(),
                    privacy_status: PrivacyStatus::Private,
                    scheduled_at: at,
                })
                .await
                .unwrap();
            (id, video)
        }
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let f = fixture().await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Worker::new(f.db.clone(), uploader.clone());

        let report = worker.check_and_post_videos().await.unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(uploader.upload_call_count(), 0);
    }

    #[tokio::test]
    async fn test_success_marks_posted_and_removes_file() {
        let f = fixture().await;
        let (id, video) = f.schedule("ok", Utc::now() - ChronoDuration::seconds(1)).await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Worker::new(f.db.clone(), uploader.clone());

        let report = worker.check_and_post_videos().await.unwrap();
        assert_eq!(report.claimed, 1);
        assert_eq!(report.posted, 1);

        let post = f.db.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Posted);
        assert_eq!(post.posted_id.as_deref(), Some("abc123"));
        assert_eq!(post.error_message, None);
        assert!(post.check_invariants().is_ok());
        assert!(!video.exists());
    }

    #[tokio::test]
    async fn test_keep_file_when_configured() {
        let f = fixture().await;
        let (_, video) = f.schedule("keep", Utc::now() - ChronoDuration::seconds(1)).await;
        let worker = Worker::new(f.db.clone(), Arc::new(MockUploader::success("abc123")))
            .delete_after_upload(false);

        worker.check_and_post_videos().await.unwrap();
        assert!(video.exists());
    }

    #[tokio::test]
    async fn test_platform_failure_marks_error_and_keeps_file() {
        let f = fixture().await;
        let (id, video) = f.schedule("denied", Utc::now() - ChronoDuration::seconds(1)).await;
        let uploader = Arc::new(MockUploader::failure(UploadError::Platform {
            status: 403,
            body: "forbidden".to_string(),
        }));
        let worker = Worker::new(f.db.clone(), uploader);

        let report = worker.check_and_post_videos().await.unwrap();
        assert_eq!(report.failed, 1);

        let post = f.db.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Error);
        assert_eq!(post.posted_id, None);
        let message = post.error_message.unwrap();
        assert!(message.contains("403"));
        assert!(message.contains("forbidden"));
        assert!(video.exists());
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_one_post() {
        let f = fixture().await;
        let now = Utc::now();
        let (first, _) = f.schedule("first", now - ChronoDuration::seconds(2)).await;
        let (second, _) = f.schedule("second", now - ChronoDuration::seconds(1)).await;
        let worker = Worker::new(f.db.clone(), Arc::new(MockUploader::panicking("simulated crash")));

        let report = worker.check_and_post_videos().await.unwrap();
        assert_eq!(report.claimed, 2);
        assert_eq!(report.failed, 2);

        for id in [first, second] {
            let post = f.db.get_post(id).await.unwrap().unwrap();
            assert_eq!(post.status, PostStatus::Error);
            assert_eq!(
                post.error_message.as_deref(),
                Some("Worker error: simulated crash")
            );
        }
    }

    #[tokio::test]
    async fn test_future_post_not_claimed_until_due() {
        let f = fixture().await;
        let now = Utc::now();
        let (id, _) = f.schedule("later", now + ChronoDuration::minutes(10)).await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Worker::new(f.db.clone(), uploader.clone());

        let report = worker.run_cycle_at(now).await.unwrap();
        assert_eq!(report.discovered, 0);
        assert_eq!(uploader.upload_call_count(), 0);
        assert_eq!(
            f.db.get_post(id).await.unwrap().unwrap().status,
            PostStatus::Pending
        );

        let report = worker
            .run_cycle_at(now + ChronoDuration::minutes(11))
            .await
            .unwrap();
        assert_eq!(report.posted, 1);
        assert_eq!(uploader.upload_call_count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_posts_not_rediscovered() {
        let f = fixture().await;
        f.schedule("once", Utc::now() - ChronoDuration::seconds(1)).await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Worker::new(f.db.clone(), uploader.clone());

        worker.check_and_post_videos().await.unwrap();
        let second = worker.check_and_post_videos().await.unwrap();

        assert_eq!(second.discovered, 0);
        assert_eq!(uploader.upload_call_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_receives_stored_options() {
        let f = fixture().await;
        f.schedule("opts", Utc::now() - ChronoDuration::seconds(1)).await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Worker::new(f.db.clone(), uploader.clone());

        worker.check_and_post_videos().await.unwrap();

        let requests = uploader.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].title, "opts");
        assert_eq!(requests[0].tags, vec!["a"]);
        assert_eq!(requests[0].privacy, PrivacyStatus::Private);
    }

    #[tokio::test]
    async fn test_discovery_failure_aborts_cycle() {
        let f = fixture().await;
        f.schedule("stranded", Utc::now() - ChronoDuration::seconds(1)).await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Worker::new(f.db.clone(), uploader.clone());

        f.db.close().await;

        assert!(worker.check_and_post_videos().await.is_err());
        assert_eq!(uploader.upload_call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture().await;
        f.schedule("daemon", Utc::now() - ChronoDuration::seconds(1)).await;
        let uploader = Arc::new(MockUploader::success("abc123"));
        let worker = Arc::new(Worker::new(f.db.clone(), uploader.clone()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let worker = worker.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.run(Duration::from_millis(50), shutdown).await })
        };

        sleep(Duration::from_millis(200)).await;
        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert_eq!(uploader.upload_call_count(), 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
