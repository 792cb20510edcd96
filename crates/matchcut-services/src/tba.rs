//! The Blue Alliance trusted write API client.
//!
//! Trusted writes are authenticated by an `X-TBA-Auth-Sig` header: the
//! MD5 hex digest of the auth secret, the request path and the raw JSON
//! body concatenated in that order.

use std::collections::BTreeMap;
use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::Client;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Configuration for the TBA trusted client.
#[derive(Debug, Clone)]
pub struct TbaConfig {
    /// API root, e.g. `https://www.thebluealliance.com`.
    pub base_url: String,
    pub auth_id: String,
    pub auth_secret: String,
    /// Full event key, e.g. `2024intip`.
    pub event_key: String,
    pub timeout: Duration,
}

/// Client for TBA trusted writes.
pub struct TbaClient {
    http: Client,
    config: TbaConfig,
}

/// MD5 hex signature over `secret + path + body`.
fn sign(secret: &str, path: &str, body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(secret.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl TbaClient {
    pub fn new(config: TbaConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    /// Register hosted videos against their matches.
    ///
    /// `videos` maps TBA match keys (e.g. `qm41`) to hosting-service
    /// video ids. A BTreeMap keeps the body byte-stable so the
    /// signature is reproducible.
    pub async fn add_match_videos(&self, videos: &BTreeMap<String, String>) -> ServiceResult<()> {
        let path = format!(
            "/api/trusted/v1/event/{}/match_videos/add",
            self.config.event_key
        );
        let body = serde_json::to_string(videos)?;
        let sig = sign(&self.config.auth_secret, &path, &body);

        let response = self
            .http
            .post(format!("{}{}", self.config.base_url, path))
            .header("X-TBA-Auth-Id", &self.config.auth_id)
            .header("X-TBA-Auth-Sig", sig)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::RequestFailed(format!(
                "results registration returned {}: {}",
                status, detail
            )));
        }
        debug!(count = videos.len(), "registered match videos");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sign_known_digests() {
        // MD5 of the empty string and of "abc".
        assert_eq!(sign("", "", ""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(sign("a", "b", "c"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[tokio::test]
    async fn test_add_match_videos_signs_request() {
        let server = MockServer::start().await;
        let api_path = "/api/trusted/v1/event/2024intip/match_videos/add";
        let body = r#"{"qm41":"dQw4w9WgXcQ"}"#;
        let expected_sig = sign("s3cret", api_path, body);

        Mock::given(method("POST"))
            .and(path(api_path))
            .and(header("X-TBA-Auth-Id", "authid"))
            .and(header("X-TBA-Auth-Sig", expected_sig.as_str()))
            .and(body_string(body))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = TbaClient::new(TbaConfig {
            base_url: server.uri(),
            auth_id: "authid".into(),
            auth_secret: "s3cret".into(),
            event_key: "2024intip".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let mut videos = BTreeMap::new();
        videos.insert("qm41".to_string(), "dQw4w9WgXcQ".to_string());
        client.add_match_videos(&videos).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_match_videos_surfaces_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad sig"))
            .mount(&server)
            .await;

        let client = TbaClient::new(TbaConfig {
            base_url: server.uri(),
            auth_id: "authid".into(),
            auth_secret: "s3cret".into(),
            event_key: "2024intip".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let mut videos = BTreeMap::new();
        videos.insert("qm1".to_string(), "abc".to_string());
        let err = client.add_match_videos(&videos).await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed(_)));
        assert!(!err.is_retryable());
    }
}
