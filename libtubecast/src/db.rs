//! Schedule store for Tubecast
//!
//! A single SQLite table of scheduled posts. Besides plain create/read, the
//! store exposes the worker's access pattern: select-due, claim, and the two
//! terminal marks. Every status change is a conditional `UPDATE` guarded by
//! the expected current status, so a change either applies exactly once or
//! reports that the record was no longer in the expected state.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DbError, Result, TubecastError};
use crate::types::{
    join_tags, parse_tags, NewScheduledPost, PostStatus, PostSummary, PrivacyStatus,
    ScheduledPost,
};

const POST_COLUMNS: &str = "id, platform, video_path, title, description, tags, category_id, \
     privacy_status, scheduled_at, status, posted_id, error_message, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // Forward slashes keep the URL valid on Windows too
        let db_url = format!("sqlite://{}", expanded_path.replace('\\', "/"));

        // WAL plus a busy timeout lets the submission tool and the worker
        // share the file without spurious "database is locked" failures
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(DbError::SqlxError)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Close every pooled connection
    ///
    /// Any later call on this handle (or its clones) fails with a
    /// database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a new post in `pending` status and return its identifier
    pub async fn create_post(&self, post: &NewScheduledPost) -> Result<i64> {
        let now = to_millis(Utc::now());

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (platform, video_path, title, description, tags, category_id,
                 privacy_status, scheduled_at, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&post.platform)
        .bind(&post.video_path)
        .bind(&post.title)
        .bind(&post.description)
        .bind(join_tags(&post.tags))
        .bind(&post.category_id)
        .bind(post.privacy_status.as_str())
        .bind(to_millis(post.scheduled_at))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: i64) -> Result<Option<ScheduledPost>> {
        let query = format!("SELECT {} FROM scheduled_posts WHERE id = ?", POST_COLUMNS);

        let row = sqlx::query(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| row_to_post(&r)).transpose()
    }

    /// Posts in `pending` status whose scheduled time is at or before `now`
    ///
    /// Earliest first; records sharing a time come back in insertion order.
    pub async fn get_due_posts(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        let query = format!(
            "SELECT {} FROM scheduled_posts \
             WHERE status = 'pending' AND scheduled_at <= ? \
             ORDER BY scheduled_at ASC, id ASC",
            POST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(to_millis(now))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    /// Atomically move a due post from `pending` to `processing`
    ///
    /// Returns `false` when the record was not pending (another worker got
    /// it first, or it already reached a terminal state) or is not due yet.
    /// Only the caller that gets `true` may upload the post.
    pub async fn claim_post(&self, post_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'processing', updated_at = ?
            WHERE id = ? AND status = ? AND scheduled_at <= ?
            "#,
        )
        .bind(to_millis(Utc::now()))
        .bind(post_id)
        .bind(source_status(PostStatus::Processing).as_str())
        .bind(to_millis(now))
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a successful upload: `processing -> posted`
    pub async fn mark_posted(&self, post_id: i64, posted_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'posted', posted_id = ?, error_message = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(posted_id)
        .bind(to_millis(Utc::now()))
        .bind(post_id)
        .bind(source_status(PostStatus::Posted).as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(post_id, PostStatus::Posted).await);
        }
        Ok(())
    }

    /// Record a failed upload: `processing -> error`
    pub async fn mark_error(&self, post_id: i64, message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'error', error_message = ?, posted_id = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(message)
        .bind(to_millis(Utc::now()))
        .bind(post_id)
        .bind(source_status(PostStatus::Error).as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(post_id, PostStatus::Error).await);
        }
        Ok(())
    }

    async fn transition_error(&self, post_id: i64, to: PostStatus) -> TubecastError {
        match self.get_post(post_id).await {
            Ok(Some(post)) => {
                if post.status.can_transition_to(to) {
                    // Moved into the source state after the update ran
                    tracing::warn!(
                        post_id,
                        status = %post.status,
                        "Post changed status concurrently"
                    );
                }
                TubecastError::InvalidTransition {
                    id: post_id,
                    from: post.status.to_string(),
                    to: to.to_string(),
                }
            }
            Ok(None) => TubecastError::NotFound(post_id),
            Err(e) => e,
        }
    }

    /// Listing projection of every post, earliest scheduled time first
    pub async fn list_posts(&self) -> Result<Vec<PostSummary>> {
        let query = format!(
            "SELECT {} FROM scheduled_posts ORDER BY scheduled_at ASC, id ASC",
            POST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| row_to_post(r).map(|post| PostSummary::from(&post)))
            .collect()
    }

    /// Number of posts in each status (statuses with no posts report 0)
    pub async fn status_counts(&self) -> Result<HashMap<PostStatus, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM scheduled_posts GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        let mut counts: HashMap<PostStatus, i64> =
            PostStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for row in rows {
            let status = parse_status(0, &row.get::<String, _>("status"))?;
            counts.insert(status, row.get("n"));
        }
        Ok(counts)
    }
}

fn row_to_post(r: &SqliteRow) -> Result<ScheduledPost> {
    let id: i64 = r.get("id");
    let tags: Option<String> = r.get("tags");
    let privacy: String = r.get("privacy_status");

    let post = ScheduledPost {
        id,
        platform: r.get("platform"),
        video_path: r.get("video_path"),
        title: r.get("title"),
        description: r.get("description"),
        tags: tags.as_deref().map(parse_tags).unwrap_or_default(),
        category_id: r.get("category_id"),
        privacy_status: PrivacyStatus::from_str(&privacy)
            .map_err(|message| DbError::CorruptRecord { id, message })?,
        scheduled_at: from_millis(id, r.get("scheduled_at"))?,
        status: parse_status(id, &r.get::<String, _>("status"))?,
        posted_id: r.get("posted_id"),
        error_message: r.get("error_message"),
        created_at: from_millis(id, r.get("created_at"))?,
        updated_at: from_millis(id, r.get("updated_at"))?,
    };

    post.check_invariants()
        .map_err(|message| DbError::CorruptRecord { id, message })?;
    Ok(post)
}

/// The only status a post may move to `to` from (`to` itself when
/// nothing leads there)
fn source_status(to: PostStatus) -> PostStatus {
    PostStatus::ALL
        .into_iter()
        .find(|from| from.can_transition_to(to))
        .unwrap_or(to)
}

fn parse_status(id: i64, raw: &str) -> Result<PostStatus> {
    PostStatus::from_str(raw).map_err(|message| DbError::CorruptRecord { id, message }.into())
}

fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_millis(id: i64, millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        DbError::CorruptRecord {
            id,
            message: format!("timestamp out of range: {}", millis),
        }
        .into()
    })
}
