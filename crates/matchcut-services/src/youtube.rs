//! YouTube Data API client: resumable uploads, thumbnails, playlists.
//!
//! Uploads use the resumable protocol so a multi-hundred-megabyte clip
//! never has to fit in one request: an initiation POST yields a session
//! URL, then the file streams up in `Content-Range`d chunks, with HTTP
//! 308 acknowledging each partial chunk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Configuration for the YouTube client.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    /// OAuth token endpoint, e.g. `https://oauth2.googleapis.com/token`.
    pub token_url: String,
    /// Upload API root, e.g. `https://www.googleapis.com/upload/youtube/v3`.
    pub upload_base_url: String,
    /// Data API root, e.g. `https://www.googleapis.com/youtube/v3`.
    pub api_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Video category, `28` (Science & Technology) for robotics events.
    pub category_id: String,
    pub privacy: String,
    pub chunk_size: usize,
    pub timeout: Duration,
}

impl YouTubeConfig {
    pub fn default_chunk_size() -> usize {
        DEFAULT_CHUNK_SIZE
    }
}

/// Metadata for one video upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Client for the YouTube Data API, authenticated by a long-lived
/// refresh token.
pub struct YouTubeClient {
    http: Client,
    config: YouTubeConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    /// Exchange the stored refresh token for a short-lived access token.
    async fn access_token(&self) -> ServiceResult<String> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::BAD_REQUEST
        {
            return Err(ServiceError::Auth(format!(
                "token refresh rejected ({})",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(ServiceError::UpstreamUnavailable(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Upload a video file and return its hosted id.
    pub async fn upload_video(&self, request: &UploadRequest) -> ServiceResult<String> {
        let token = self.access_token().await?;
        let total = tokio::fs::metadata(&request.path).await?.len();
        if total == 0 {
            return Err(ServiceError::RequestFailed(format!(
                "refusing to upload empty file {}",
                request.path.display()
            )));
        }
        let session_url = self.initiate_upload(&token, request, total).await?;
        let id = self
            .upload_chunks(&token, &session_url, &request.path, total)
            .await?;
        info!(video = %id, title = %request.title, "upload complete");
        Ok(id)
    }

    async fn initiate_upload(
        &self,
        token: &str,
        request: &UploadRequest,
        total: u64,
    ) -> ServiceResult<String> {
        let url = format!("{}/videos", self.config.upload_base_url);
        let body = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "tags": request.tags,
                "categoryId": self.config.category_id,
            },
            "status": {
                "privacyStatus": self.config.privacy,
                "selfDeclaredMadeForKids": false,
            },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Length", total)
            .header("X-Upload-Content-Type", "video/*")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::RequestFailed(format!(
                "upload initiation returned {}",
                response.status()
            )));
        }
        response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ServiceError::InvalidResponse("upload initiation missing Location header".into())
            })
    }

    async fn upload_chunks(
        &self,
        token: &str,
        session_url: &str,
        path: &Path,
        total: u64,
    ) -> ServiceResult<String> {
        let mut file = File::open(path).await?;
        let mut offset: u64 = 0;

        loop {
            let remaining = total - offset;
            let len = remaining.min(self.config.chunk_size as u64) as usize;
            let mut chunk = vec![0u8; len];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk).await?;

            let range = format!("bytes {}-{}/{}", offset, offset + len as u64 - 1, total);
            debug!(%range, "uploading chunk");

            let response = self
                .http
                .put(session_url)
                .bearer_auth(token)
                .header("Content-Range", range)
                .body(chunk)
                .send()
                .await
                .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

            match response.status().as_u16() {
                // 308 Resume Incomplete: the Range header tells us how
                // far the server actually got.
                308 => {
                    offset = response
                        .headers()
                        .get("Range")
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_range_end)
                        .map(|end| end + 1)
                        .unwrap_or(offset + len as u64);
                }
                200 | 201 => {
                    let resource: VideoResource = response.json().await?;
                    return Ok(resource.id);
                }
                status => {
                    return Err(ServiceError::RequestFailed(format!(
                        "chunk upload returned {}",
                        status
                    )));
                }
            }
        }
    }

    /// Set a custom thumbnail on an uploaded video.
    pub async fn set_thumbnail(&self, video_id: &str, image_path: &Path) -> ServiceResult<()> {
        let token = self.access_token().await?;
        let bytes = tokio::fs::read(image_path).await?;
        let url = format!("{}/thumbnails/set", self.config.upload_base_url);

        let response = self
            .http
            .post(&url)
            .query(&[("videoId", video_id)])
            .bearer_auth(token)
            .header("Content-Type", "image/png")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::RequestFailed(format!(
                "thumbnail set returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Append an uploaded video to a playlist.
    pub async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> ServiceResult<()> {
        let token = self.access_token().await?;
        let url = format!("{}/playlistItems", self.config.api_base_url);
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                },
            },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("part", "snippet")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::RequestFailed(format!(
                "playlist insert returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Extract the end byte of a `Range: bytes=0-12345` header.
fn parse_range_end(value: &str) -> Option<u64> {
    value.rsplit('-').next()?.parse().ok()
}
