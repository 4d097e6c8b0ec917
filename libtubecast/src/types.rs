//! Core types for Tubecast
//!
//! `ScheduledPost` is the only persistent entity. Its `status` follows a
//! small state machine:
//!
//! ```text
//! pending -> processing -> posted
//!                       \-> error
//! ```
//!
//! `posted` and `error` are terminal. Nothing skips `processing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Platform tag stored on every record. Only one platform is supported.
pub const PLATFORM_YOUTUBE: &str = "youtube";

/// Default platform category ("People & Blogs")
pub const DEFAULT_CATEGORY_ID: &str = "22";

/// Separator used to store the tag list in a single column
pub const TAG_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Waiting for its scheduled time
    Pending,
    /// Claimed by a worker; upload in flight
    Processing,
    /// Uploaded; `posted_id` is set
    Posted,
    /// Upload failed; `error_message` is set
    Error,
}

impl PostStatus {
    pub const ALL: [PostStatus; 4] = [
        PostStatus::Pending,
        PostStatus::Processing,
        PostStatus::Posted,
        PostStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Processing => "processing",
            PostStatus::Posted => "posted",
            PostStatus::Error => "error",
        }
    }

    /// Terminal states are never mutated again by automated code
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Posted | PostStatus::Error)
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        matches!(
            (self, next),
            (PostStatus::Pending, PostStatus::Processing)
                | (PostStatus::Processing, PostStatus::Posted)
                | (PostStatus::Processing, PostStatus::Error)
        )
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "processing" => Ok(PostStatus::Processing),
            "posted" => Ok(PostStatus::Posted),
            "error" => Ok(PostStatus::Error),
            other => Err(format!("Unknown post status: '{}'", other)),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "private" => Ok(PrivacyStatus::Private),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "public" => Ok(PrivacyStatus::Public),
            other => Err(format!(
                "Invalid privacy status: '{}'. Valid options: private, unlisted, public",
                other
            )),
        }
    }
}

impl std::fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A video awaiting, or having undergone, upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledPost {
    pub id: i64,
    pub platform: String,
    pub video_path: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    pub posted_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPost {
    /// Check the record-level invariants
    ///
    /// - `posted_id` is set if and only if the post is `posted`
    /// - `error_message` is set only when the post is `error`
    /// - `title` is non-empty
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(format!("post {} has an empty title", self.id));
        }
        if (self.status == PostStatus::Posted) != self.posted_id.is_some() {
            return Err(format!(
                "post {} has status {} but posted_id {:?}",
                self.id, self.status, self.posted_id
            ));
        }
        if self.error_message.is_some() && self.status != PostStatus::Error {
            return Err(format!(
                "post {} has an error message but status {}",
                self.id, self.status
            ));
        }
        Ok(())
    }
}

/// Fields of a post before the store assigns its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledPost {
    pub platform: String,
    pub video_path: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub scheduled_at: DateTime<Utc>,
}

/// Listing projection of a post
///
/// Video path, description and tags are left out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostSummary {
    pub id: i64,
    pub platform: String,
    pub title: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    pub posted_id: Option<String>,
    pub error_message: Option<String>,
}

impl From<&ScheduledPost> for PostSummary {
    fn from(post: &ScheduledPost) -> Self {
        Self {
            id: post.id,
            platform: post.platform.clone(),
            title: post.title.clone(),
            scheduled_time: post.scheduled_at,
            status: post.status,
            posted_id: post.posted_id.clone(),
            error_message: post.error_message.clone(),
        }
    }
}

/// Split a comma-separated tag string
///
/// Whitespace around each tag is trimmed and empty entries are dropped, so
/// `"a, b,, c "` becomes `["a", "b", "c"]`.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join tags for storage, or `None` when there are none
pub fn join_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(&TAG_SEPARATOR.to_string()))
    }
}
