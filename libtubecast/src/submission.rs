//! Submission handling
//!
//! Validates a submission, moves the video into the upload directory and
//! creates the `pending` record. A submission either produces exactly one
//! record with its stored file, or fails and leaves nothing behind.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::YouTubeConfig;
use crate::db::Database;
use crate::error::{DbError, Result, TubecastError};
use crate::scheduling::parse_scheduled_time;
use crate::types::{parse_tags, NewScheduledPost, PrivacyStatus, PLATFORM_YOUTUBE};

pub const DEFAULT_TITLE: &str = "Untitled video";

/// Platform limit on title length, in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// Raw submission fields, as received from the caller
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    /// Video to schedule; `None` means no file was attached
    pub video_path: Option<PathBuf>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<String>,
    pub category: Option<String>,
    /// Comma-separated
    pub tags: Option<String>,
    pub scheduled_time: Option<String>,
}

/// Values applied when a submission leaves a field out
#[derive(Debug, Clone)]
pub struct SubmissionDefaults {
    pub privacy: PrivacyStatus,
    pub category_id: String,
}

impl From<&YouTubeConfig> for SubmissionDefaults {
    fn from(config: &YouTubeConfig) -> Self {
        Self {
            privacy: config.default_privacy,
            category_id: config.default_category.clone(),
        }
    }
}

pub struct SubmissionHandler {
    db: Database,
    upload_dir: PathBuf,
    defaults: SubmissionDefaults,
}

impl SubmissionHandler {
    pub fn new(db: Database, upload_dir: impl Into<PathBuf>, defaults: SubmissionDefaults) -> Self {
        Self {
            db,
            upload_dir: upload_dir.into(),
            defaults,
        }
    }

    /// Validate and store a submission, returning the new post id
    ///
    /// # Errors
    ///
    /// - `Validation` when no file is attached, the file name is empty, the
    ///   file does not exist, the scheduled time is missing or unparseable,
    ///   or privacy/category are invalid. Nothing is stored.
    /// - `Database` when the file cannot be stored or the record cannot be
    ///   inserted. The stored copy is removed again.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<i64> {
        let post = self.validate(&request)?;
        let source = request
            .video_path
            .as_deref()
            .ok_or_else(|| TubecastError::Validation("No video file was sent".to_string()))?;

        let stored = self.store_video(source).await?;

        let post = NewScheduledPost {
            video_path: stored.to_string_lossy().to_string(),
            ..post
        };

        match self.db.create_post(&post).await {
            Ok(id) => {
                tracing::info!(
                    post_id = id,
                    scheduled_at = %post.scheduled_at.to_rfc3339(),
                    "Scheduled video"
                );
                Ok(id)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&stored).await {
                    tracing::warn!(path = %stored.display(), error = %rm, "Could not remove stored video");
                }
                Err(e)
            }
        }
    }

    /// Check every field and build the record (without its stored path)
    fn validate(&self, request: &SubmissionRequest) -> Result<NewScheduledPost> {
        let source = request
            .video_path
            .as_deref()
            .ok_or_else(|| TubecastError::Validation("No video file was sent".to_string()))?;

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| TubecastError::Validation("No file was selected".to_string()))?;

        let scheduled_time = request
            .scheduled_time
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TubecastError::Validation("Scheduled time is required".to_string()))?;
        let scheduled_at = parse_scheduled_time(scheduled_time, Utc::now())?;

        if !source.is_file() {
            return Err(TubecastError::Validation(format!(
                "Video file not found: {}",
                source.display()
            )));
        }

        let privacy_status = match request.privacy.as_deref().map(str::trim) {
            None | Some("") => self.defaults.privacy,
            Some(raw) => PrivacyStatus::from_str(raw).map_err(TubecastError::Validation)?,
        };

        let category_id = match request.category.as_deref().map(str::trim) {
            None | Some("") => self.defaults.category_id.clone(),
            Some(raw) if raw.chars().all(|c| c.is_ascii_digit()) => raw.to_string(),
            Some(raw) => {
                return Err(TubecastError::Validation(format!(
                    "Invalid category '{}': must be a numeric category id",
                    raw
                )))
            }
        };

        tracing::debug!(file = %file_name, "Submission validated");

        Ok(NewScheduledPost {
            platform: PLATFORM_YOUTUBE.to_string(),
            video_path: String::new(),
            title: normalize_title(request.title.as_deref()),
            description: request
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            tags: request.tags.as_deref().map(parse_tags).unwrap_or_default(),
            category_id,
            privacy_status,
            scheduled_at,
        })
    }

    /// Copy the video into the upload directory under a unique name
    async fn store_video(&self, source: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(DbError::IoError)?;

        let original = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let dest = self.upload_dir.join(format!(
            "{}-{}",
            uuid::Uuid::new_v4(),
            sanitize_filename(&original)
        ));

        tokio::fs::copy(source, &dest)
            .await
            .map_err(DbError::IoError)?;

        Ok(dest)
    }
}

/// Trimmed title, defaulted when blank and cut to the platform limit
pub fn normalize_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        None | Some("") => DEFAULT_TITLE.to_string(),
        Some(t) => t.chars().take(MAX_TITLE_CHARS).collect(),
    }
}

/// Reduce a file name to a safe ASCII form
///
/// Keeps letters, digits, `.`, `-` and `_`; everything else becomes `_`.
/// Leading dots are dropped so the result is never hidden or a path
/// component like `..`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}
