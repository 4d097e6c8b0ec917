//! YouTube Data API uploader
//!
//! Uses the resumable upload protocol: one request opens an upload session
//! carrying the video metadata, then the file is sent in fixed-size chunks
//! with `Content-Range` headers. Only one chunk is held in memory at a time.

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::{YouTubeConfig, UPLOAD_CHUNK_GRANULARITY};
use crate::credentials::CredentialProvider;
use crate::error::UploadError;
use crate::platforms::{content_type_for, UploadRequest, Uploader};

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

pub struct YouTubeUploader {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    api_base: String,
    chunk_size: usize,
}

impl YouTubeUploader {
    pub fn new(credentials: Arc<dyn CredentialProvider>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_config(config: &YouTubeConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(credentials, config.api_base.clone()).with_chunk_size(config.chunk_size_bytes())
    }

    /// Set the chunk size, rounded down to a multiple of 256 KiB
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size =
            (bytes / UPLOAD_CHUNK_GRANULARITY).max(1) * UPLOAD_CHUNK_GRANULARITY;
        self
    }

    fn metadata_body(request: &UploadRequest) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": request.title,
                "description": request.description.clone().unwrap_or_default(),
                "tags": request.tags,
                "categoryId": request.category_id,
            },
            "status": {
                "privacyStatus": request.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            }
        })
    }

    /// Open a resumable session and return its URI
    async fn start_session(
        &self,
        token: &SecretString,
        request: &UploadRequest,
        total: u64,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let url = format!("{}/upload/youtube/v3/videos", self.api_base);

        let resp = self
            .client
            .post(&url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token.expose_secret())
            .header("X-Upload-Content-Length", total.to_string())
            .header("X-Upload-Content-Type", content_type)
            .json(&Self::metadata_body(request))
            .send()
            .await
            .map_err(|e| UploadError::Transport(format!("Failed to start upload: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(platform_error(resp).await);
        }

        resp.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::Transport("Upload session response had no Location header".to_string())
            })
    }

    /// Send the file to an open session, returning the video id
    async fn send_chunks(
        &self,
        token: &SecretString,
        session_uri: &str,
        request: &UploadRequest,
        total: u64,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let mut file = tokio::fs::File::open(&request.video_path)
            .await
            .map_err(|e| file_error(request, e))?;

        let mut offset: u64 = 0;
        // Set once the server has dropped every byte; a second time fails
        let mut restarted = false;
        loop {
            let end = (offset + self.chunk_size as u64).min(total);
            let mut chunk = vec![0u8; (end - offset) as usize];
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| file_error(request, e))?;
            file.read_exact(&mut chunk)
                .await
                .map_err(|e| file_error(request, e))?;

            tracing::debug!(offset, end, total, "Sending upload chunk");

            let resp = self
                .client
                .put(session_uri)
                .bearer_auth(token.expose_secret())
                .header(CONTENT_TYPE, content_type)
                .header(CONTENT_RANGE, format!("bytes {}-{}/{}", offset, end - 1, total))
                .body(chunk)
                .send()
                .await
                .map_err(|e| UploadError::Transport(format!("Upload interrupted: {}", e)))?;

            let status = resp.status();
            if status == StatusCode::OK || status == StatusCode::CREATED {
                let text = resp
                    .text()
                    .await
                    .map_err(|e| UploadError::Transport(e.to_string()))?;
                let video: VideoResource = serde_json::from_str(&text).map_err(|e| {
                    UploadError::Transport(format!(
                        "Unexpected upload response: {} - body: {}",
                        e, text
                    ))
                })?;
                return Ok(video.id);
            }

            if status == StatusCode::PERMANENT_REDIRECT {
                // No Range header: nothing has been persisted yet
                let acknowledged = resp.headers().get(RANGE).map(|v| {
                    v.to_str()
                        .ok()
                        .and_then(parse_range_end)
                        .map_or(0, |last| last + 1)
                });
                let next = acknowledged.unwrap_or(0);

                if next > offset && next < total {
                    offset = next;
                    continue;
                }

                if acknowledged.is_some() || restarted || next >= total {
                    return Err(UploadError::Transport(format!(
                        "Upload stalled: server acknowledged {} of {} bytes",
                        next, total
                    )));
                }

                tracing::debug!(offset, next, "Server kept no bytes, resending");
                restarted = true;
                offset = next;
                continue;
            }

            return Err(platform_error(resp).await);
        }
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadError> {
        let metadata = tokio::fs::metadata(&request.video_path)
            .await
            .map_err(|e| file_error(request, e))?;
        let total = metadata.len();
        if total == 0 {
            return Err(UploadError::Transport(format!(
                "Video file {} is empty",
                request.video_path.display()
            )));
        }

        let token = self.credentials.access_token().await?;
        let content_type = content_type_for(&request.video_path);

        let session_uri = self
            .start_session(&token, request, total, content_type)
            .await?;
        tracing::debug!(total, content_type, "Upload session opened");

        self.send_chunks(&token, &session_uri, request, total, content_type)
            .await
    }
}

async fn platform_error(resp: reqwest::Response) -> UploadError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    UploadError::Platform { status, body }
}

fn file_error(request: &UploadRequest, e: std::io::Error) -> UploadError {
    UploadError::Transport(format!(
        "Cannot read video file {}: {}",
        request.video_path.display(),
        e
    ))
}

/// Last acknowledged byte from a `Range: bytes=0-N` header
fn parse_range_end(value: &str) -> Option<u64> {
    value
        .trim()
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}
