//! Several workers sharing one schedule store
//!
//! The claim is the only cross-worker coordination, so these tests check
//! that it holds under real contention: every due post is uploaded exactly
//! once no matter how many workers poll at the same time.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use libtubecast::platforms::mock::MockUploader;
use libtubecast::types::{DEFAULT_CATEGORY_ID, PLATFORM_YOUTUBE};
use libtubecast::{Database, NewScheduledPost, PostStatus, PrivacyStatus, Worker};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn setup() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let db = Database::new(temp_dir.path().join("shared.db").to_str().unwrap()).await?;
    Ok((temp_dir, db))
}

async fn schedule_due(db: &Database, dir: &TempDir, n: usize) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for i in 0..n {
        let video = dir.path().join(format!("v{}.mp4", i));
        std::fs::write(&video, b"video")?;
        ids.push(
            db.create_post(&NewScheduledPost {
                platform: PLATFORM_YOUTUBE.to_string(),
                video_path: video.to_string_lossy().to_string(),
                title: format!("Video {}", i),
                description: None,
                tags: vec![],
                category_id: DEFAULT_CATEGORY_ID.to_string(),
                privacy_status: PrivacyStatus::Private,
                scheduled_at: Utc::now() - ChronoDuration::seconds(1),
            })
            .await?,
        );
    }
    Ok(ids)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_workers_one_upload() -> Result<()> {
    let (dir, db) = setup().await?;
    let ids = schedule_due(&db, &dir, 1).await?;

    let first = Arc::new(MockUploader::with_delay("first", Duration::from_millis(100)));
    let second = Arc::new(MockUploader::with_delay("second", Duration::from_millis(100)));
    let worker_a = Worker::new(db.clone(), first.clone());
    let worker_b = Worker::new(db.clone(), second.clone());

    let (a, b) = tokio::join!(
        worker_a.check_and_post_videos(),
        worker_b.check_and_post_videos()
    );
    let (a, b) = (a?, b?);

    assert_eq!(first.upload_call_count() + second.upload_call_count(), 1);
    assert_eq!(a.claimed + b.claimed, 1);
    assert_eq!(a.posted + b.posted, 1);

    let post = db.get_post(ids[0]).await?.expect("post exists");
    assert_eq!(post.status, PostStatus::Posted);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_workers_many_posts_each_uploaded_once() -> Result<()> {
    let (dir, db) = setup().await?;
    let ids = schedule_due(&db, &dir, 10).await?;

    let uploaders: Vec<Arc<MockUploader>> = (0..4)
        .map(|_| Arc::new(MockUploader::with_delay("posted", Duration::from_millis(10))))
        .collect();

    let handles: Vec<_> = uploaders
        .iter()
        .map(|uploader| {
            let worker = Worker::new(db.clone(), uploader.clone());
            tokio::spawn(async move { worker.check_and_post_videos().await })
        })
        .collect();

    let mut claimed = 0;
    for handle in handles {
        claimed += handle.await??.claimed;
    }

    let uploads: usize = uploaders.iter().map(|u| u.upload_call_count()).sum();
    assert_eq!(uploads, ids.len());
    assert_eq!(claimed, ids.len());

    // Every title went out exactly once
    let mut titles: Vec<String> = uploaders
        .iter()
        .flat_map(|u| u.requests())
        .map(|r| r.title)
        .collect();
    titles.sort();
    titles.dedup();
    assert_eq!(titles.len(), ids.len());

    for id in ids {
        let post = db.get_post(id).await?.expect("post exists");
        assert_eq!(post.status, PostStatus::Posted);
        assert!(post.check_invariants().is_ok());
    }
    Ok(())
}
