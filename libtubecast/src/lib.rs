//! Tubecast - Unix tools for scheduled video uploads
//!
//! This library holds the scheduling pipeline shared by the `tube-*`
//! binaries: the schedule store, the upload adapter, the worker loop and
//! the submission handler.

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod platforms;
pub mod scheduling;
pub mod submission;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{CredentialProvider, StaticTokenProvider, TokenFileProvider, TokenStatus};
pub use db::Database;
pub use error::{Result, TubecastError, UploadError};
pub use platforms::{UploadRequest, Uploader};
pub use submission::{SubmissionDefaults, SubmissionHandler, SubmissionRequest};
pub use types::{NewScheduledPost, PostStatus, PostSummary, PrivacyStatus, ScheduledPost};
pub use worker::{CycleReport, Worker};
