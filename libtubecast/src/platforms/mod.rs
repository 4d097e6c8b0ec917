//! Upload adapters for video platforms
//!
//! The worker talks to a platform only through the [`Uploader`] trait. An
//! uploader turns one [`UploadRequest`] into either the platform-assigned
//! video id or a classified [`UploadError`], and never touches the schedule
//! store.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libtubecast::credentials::TokenFileProvider;
//! use libtubecast::platforms::{youtube::YouTubeUploader, UploadRequest, Uploader};
//! use libtubecast::types::PrivacyStatus;
//!
//! # async fn example() -> Result<(), libtubecast::error::UploadError> {
//! let credentials = Arc::new(TokenFileProvider::new("/home/me/.config/tubecast/youtube_token.json"));
//! let uploader = YouTubeUploader::new(credentials, "https://www.googleapis.com");
//!
//! let request = UploadRequest {
//!     video_path: "/tmp/talk.mp4".into(),
//!     title: "Conference talk".to_string(),
//!     description: None,
//!     tags: vec!["rust".to_string()],
//!     category_id: "28".to_string(),
//!     privacy: PrivacyStatus::Unlisted,
//! };
//!
//! let video_id = uploader.upload(&request).await?;
//! println!("https://www.youtube.com/watch?v={}", video_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::UploadError;
use crate::types::{PrivacyStatus, ScheduledPost};

pub mod youtube;

// Mock uploader is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Everything an uploader needs to publish one video
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub video_path: PathBuf,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: PrivacyStatus,
}

impl From<&ScheduledPost> for UploadRequest {
    fn from(post: &ScheduledPost) -> Self {
        Self {
            video_path: PathBuf::from(&post.video_path),
            title: post.title.clone(),
            description: post.description.clone(),
            tags: post.tags.clone(),
            category_id: post.category_id.clone(),
            privacy: post.privacy_status,
        }
    }
}

/// A video platform the worker can upload to
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Short platform name used in logs
    fn name(&self) -> &str;

    /// Upload the video and return the platform's id for it
    ///
    /// The whole transfer is one logical attempt. Implementations must not
    /// retry internally; a failure is reported to the caller, which decides
    /// what happens to the record.
    ///
    /// # Errors
    ///
    /// - `UploadError::Platform` when the remote API answers with a
    ///   non-success status (status code and raw body are kept)
    /// - `UploadError::Transport` for file, network and decoding failures
    /// - `UploadError::Auth` when no usable credential is available
    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadError>;
}

/// MIME type for a video file, derived from its extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("3gp") => "video/3gpp",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        _ => "application/octet-stream",
    }
}
