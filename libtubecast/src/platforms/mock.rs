//! Mock uploader for testing
//!
//! A configurable uploader that can simulate success, classified failures,
//! slow transfers and panics. It records every request it receives so tests
//! can verify what the worker sent, without platform credentials or network
//! access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::UploadError;
use crate::platforms::{UploadRequest, Uploader};

/// What the mock does when asked to upload
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this posted id
    Success(String),
    /// Return this error
    Failure(UploadError),
    /// Panic with this message
    Panic(String),
}

/// Configuration for mock uploader behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Name reported by `Uploader::name`
    pub name: String,

    pub outcome: MockOutcome,

    /// Delay before completing the upload (simulates transfer time)
    pub delay: Duration,

    /// Number of times upload has been called
    pub upload_call_count: Arc<Mutex<usize>>,

    /// Requests that have been received (for verification)
    pub requests: Arc<Mutex<Vec<UploadRequest>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            outcome: MockOutcome::Success("mock-video-id".to_string()),
            delay: Duration::from_millis(0),
            upload_call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock uploader for testing
pub struct MockUploader {
    config: MockConfig,
}

impl MockUploader {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock that always returns `posted_id`
    pub fn success(posted_id: &str) -> Self {
        Self::new(MockConfig {
            outcome: MockOutcome::Success(posted_id.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock that always fails with `error`
    pub fn failure(error: UploadError) -> Self {
        Self::new(MockConfig {
            outcome: MockOutcome::Failure(error),
            ..Default::default()
        })
    }

    /// Create a mock that panics mid-upload
    pub fn panicking(message: &str) -> Self {
        Self::new(MockConfig {
            outcome: MockOutcome::Panic(message.to_string()),
            ..Default::default()
        })
    }

    /// Create a successful mock that takes `delay` per upload
    pub fn with_delay(posted_id: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            outcome: MockOutcome::Success(posted_id.to_string()),
            delay,
            ..Default::default()
        })
    }

    /// Get the number of times upload was called
    pub fn upload_call_count(&self) -> usize {
        *self.config.upload_call_count.lock().unwrap()
    }

    /// Get every request that was received
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.config.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadError> {
        *self.config.upload_call_count.lock().unwrap() += 1;
        self.config.requests.lock().unwrap().push(request.clone());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.outcome {
            MockOutcome::Success(id) => Ok(id.clone()),
            MockOutcome::Failure(error) => Err(error.clone()),
            MockOutcome::Panic(message) => panic!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrivacyStatus;

    fn request() -> UploadRequest {
        UploadRequest {
            video_path: "/tmp/video.mp4".into(),
            title: "Test".to_string(),
            description: None,
            tags: vec![],
            category_id: "22".to_string(),
            privacy: PrivacyStatus::Private,
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let uploader = MockUploader::success("abc123");

        assert_eq!(uploader.name(), "mock");
        assert_eq!(uploader.upload(&request()).await.unwrap(), "abc123");
        assert_eq!(uploader.upload_call_count(), 1);

        let requests = uploader.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].title, "Test");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let uploader = MockUploader::failure(UploadError::Platform {
            status: 403,
            body: "forbidden".to_string(),
        });

        let err = uploader.upload(&request()).await.unwrap_err();
        assert_eq!(
            err,
            UploadError::Platform {
                status: 403,
                body: "forbidden".to_string()
            }
        );
        assert_eq!(uploader.upload_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let uploader = MockUploader::with_delay("slow", Duration::from_millis(50));

        let start = std::time::Instant::now();
        uploader.upload(&request()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    #[should_panic(expected = "simulated crash")]
    async fn test_mock_panics() {
        let uploader = MockUploader::panicking("simulated crash");
        let _ = uploader.upload(&request()).await;
    }
}
