//! Twitch helix client: app token, channel lookup and VOD listing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use matchcut_models::{parse_platform_duration, VideoSegment};

use crate::error::{ServiceError, ServiceResult};

/// Configuration for the Twitch client.
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    /// OAuth token endpoint root, e.g. `https://id.twitch.tv`.
    pub id_base_url: String,
    /// Helix API root, e.g. `https://api.twitch.tv/helix`.
    pub api_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Offset from UTC of the event venue, in hours. VOD timestamps
    /// come back in UTC but the schedule API reports venue-local time.
    pub utc_offset_hours: i32,
    pub timeout: Duration,
}

/// Client for the Twitch helix API, using app (client-credentials)
/// authentication.
pub struct TwitchClient {
    http: Client,
    config: TwitchConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    data: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    data: Vec<VideoEntry>,
}

#[derive(Debug, Deserialize)]
struct VideoEntry {
    id: String,
    created_at: DateTime<Utc>,
    duration: String,
}

impl TwitchClient {
    pub fn new(config: TwitchConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    /// Fetch a fresh app access token.
    pub async fn fetch_token(&self) -> ServiceResult<String> {
        let url = format!("{}/oauth2/token", self.config.id_base_url);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            return Err(ServiceError::Auth(
                "streaming platform rejected client credentials".into(),
            ));
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

    /// Resolve a channel login name to its numeric user id.
    pub async fn user_id(&self, token: &str, login: &str) -> ServiceResult<String> {
        let url = format!("{}/users", self.config.api_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("login", login)])
            .header("Client-Id", &self.config.client_id)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::UpstreamUnavailable(format!(
                "user lookup returned {}",
                response.status()
            )));
        }
        let users: UsersResponse = response.json().await?;
        users
            .data
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| ServiceError::InvalidResponse(format!("no such channel '{}'", login)))
    }

    /// List the channel's archive VODs, newest first, converted to
    /// venue-local time.
    pub async fn list_videos(&self, token: &str, user_id: &str) -> ServiceResult<Vec<VideoSegment>> {
        let url = format!("{}/videos", self.config.api_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("user_id", user_id),
                ("type", "archive"),
                ("first", "100"),
            ])
            .header("Client-Id", &self.config.client_id)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::UpstreamUnavailable(format!(
                "video listing returned {}",
                response.status()
            )));
        }
        let videos: VideosResponse = response.json().await?;
        let offset = chrono::Duration::hours(i64::from(self.config.utc_offset_hours));

        let mut segments = Vec::with_capacity(videos.data.len());
        for entry in videos.data {
            let duration_seconds = match parse_platform_duration(&entry.duration) {
                Ok(d) => d,
                Err(e) => {
                    warn!(video = %entry.id, error = %e, "skipping VOD with unparseable duration");
                    continue;
                }
            };
            segments.push(VideoSegment {
                id: entry.id,
                created_at: (entry.created_at + offset).naive_utc(),
                duration_seconds,
            });
        }
        debug!(count = segments.len(), "listed VOD segments");
        Ok(segments)
    }
}
