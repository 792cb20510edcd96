//! Event configuration and credentials.
//!
//! Two JSON files drive a run: the event config (what to clip, where
//! the footage is, how to time the cuts) and the credentials file
//! (API keys only, so the event config can live in version control).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use matchcut_models::{MatchId, TimingProfile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Competition program the event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Program {
    Frc,
    Ftc,
}

impl Program {
    /// The Blue Alliance only tracks FRC events.
    pub fn supports_results_registration(&self) -> bool {
        matches!(self, Program::Frc)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Program::Frc => "FRC",
            Program::Ftc => "FTC",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            Program::Frc => "FIRST Robotics Competition",
            Program::Ftc => "FIRST Tech Challenge",
        }
    }
}

/// Where the footage comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum VideoSource {
    /// Watch a streaming channel's VOD archive during the event.
    Live { channel: String },
    /// Cut from a single pre-recorded local file.
    Static {
        path: PathBuf,
        /// A played match whose start is visible in the recording.
        /// Its wall-clock start time, from the schedule, anchors the
        /// file timeline.
        anchor_match_id: MatchId,
        /// Where that match's start falls in the file, in seconds.
        anchor_offset_seconds: f64,
    },
}

fn default_privacy() -> String {
    "unlisted".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

/// Per-event configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    pub program: Program,
    pub season: u16,
    /// FMS event code, e.g. `INTIP`.
    pub event_code: String,
    /// Human-readable event name used in titles and thumbnails.
    pub event_title: String,
    pub timing: TimingProfile,
    pub video_source: VideoSource,
    /// Offset from UTC of the event venue, in hours.
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub playlist_id: Option<String>,
    /// Extra upload tags; event/program tags are added automatically.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Full results-tracker event key, e.g. `2024intip`. Required to
    /// register videos with The Blue Alliance.
    #[serde(default)]
    pub tba_event_key: Option<String>,
    #[serde(default)]
    pub thumbnail_background: Option<PathBuf>,
    #[serde(default)]
    pub thumbnail_logo: Option<PathBuf>,
    #[serde(default = "default_privacy")]
    pub privacy: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl EventConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_code.is_empty() {
            return Err(ConfigError::Invalid("event_code is empty".into()));
        }
        if self.timing.seconds_of_match <= 0.0 {
            return Err(ConfigError::Invalid(
                "timing.seconds_of_match must be positive".into(),
            ));
        }
        if self.timing.seconds_after_post <= self.timing.seconds_before_post {
            return Err(ConfigError::Invalid(
                "timing.seconds_after_post must exceed timing.seconds_before_post".into(),
            ));
        }
        if self.tba_event_key.is_some() && !self.program.supports_results_registration() {
            return Err(ConfigError::Invalid(
                "results registration is only available for FRC events".into(),
            ));
        }
        if let VideoSource::Static { path, .. } = &self.video_source {
            if !path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "static footage file {} does not exist",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Directory the finished clips land in.
    pub fn clips_dir(&self) -> PathBuf {
        self.work_dir.join("clips")
    }
}

/// API credentials, kept out of the event config.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub fms_username: String,
    pub fms_auth_key: String,
    #[serde(default)]
    pub twitch_client_id: Option<String>,
    #[serde(default)]
    pub twitch_client_secret: Option<String>,
    pub youtube_client_id: String,
    pub youtube_client_secret: String,
    pub youtube_refresh_token: String,
    #[serde(default)]
    pub tba_auth_id: Option<String>,
    #[serde(default)]
    pub tba_auth_secret: Option<String>,
}

impl Credentials {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the credential set covers everything the event config
    /// will actually use.
    pub fn validate_for(&self, config: &EventConfig) -> Result<(), ConfigError> {
        if matches!(config.video_source, VideoSource::Live { .. })
            && (self.twitch_client_id.is_none() || self.twitch_client_secret.is_none())
        {
            return Err(ConfigError::Invalid(
                "live mode requires twitch_client_id and twitch_client_secret".into(),
            ));
        }
        if config.tba_event_key.is_some()
            && (self.tba_auth_id.is_none() || self.tba_auth_secret.is_none())
        {
            return Err(ConfigError::Invalid(
                "tba_event_key set but tba_auth_id/tba_auth_secret missing".into(),
            ));
        }
        Ok(())
    }
}
