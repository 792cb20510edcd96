//! FIRST field-management (FMS) schedule client.
//!
//! Fetches played matches for an event at both tournament levels and
//! normalizes them into [`MatchRecord`]s: playoff matches are renumbered
//! into the `P`/`F` scheme and matches without both timestamps are
//! dropped as not yet played.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use matchcut_models::{MatchId, MatchRecord, Round};

use crate::error::{ServiceError, ServiceResult};

/// Number of non-final rounds in a double-elimination bracket.
/// Playoff match numbers above this are finals.
pub const DOUBLE_ELIM_ROUNDS: u32 = 13;

const LEVELS: [&str; 2] = ["Qualification", "Playoff"];

/// Configuration for the FMS client.
#[derive(Debug, Clone)]
pub struct FmsConfig {
    /// API root, e.g. `https://frc-api.firstinspires.org/v3.0`.
    pub base_url: String,
    pub season: u16,
    pub event_code: String,
    pub username: String,
    pub auth_key: String,
    pub timeout: Duration,
}

impl FmsConfig {
    fn auth_header(&self) -> String {
        let token = BASE64.encode(format!("{}:{}", self.username, self.auth_key));
        format!("Basic {}", token)
    }
}

/// Client for the FMS schedule API.
pub struct FmsClient {
    http: Client,
    config: FmsConfig,
}

#[derive(Debug, Deserialize)]
struct RawScheduleResponse {
    #[serde(rename = "Matches", default)]
    matches: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatch {
    #[serde(default)]
    actual_start_time: Option<NaiveDateTime>,
    #[serde(default)]
    post_result_time: Option<NaiveDateTime>,
    #[serde(default)]
    description: String,
    match_number: u32,
    tournament_level: String,
    #[serde(default)]
    is_replay: Option<bool>,
    #[serde(default)]
    teams: Vec<RawTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTeam {
    team_number: u32,
    #[serde(default)]
    station: String,
}

/// Normalize a raw (level, description, number) triple into a match id.
///
/// The Playoff level mixes bracket matches and finals: finals either
/// carry a description starting with `F` or a number past the bracket
/// size, in which case the number restarts from one.
fn normalize_id(level: &str, description: &str, number: u32) -> MatchId {
    if level.eq_ignore_ascii_case("Qualification") {
        return MatchId::new(Round::Qualification, number);
    }
    if number > DOUBLE_ELIM_ROUNDS {
        MatchId::new(Round::Final, number - DOUBLE_ELIM_ROUNDS)
    } else if description
        .trim_start()
        .starts_with(['F', 'f'])
    {
        MatchId::new(Round::Final, number)
    } else {
        MatchId::new(Round::Playoff, number)
    }
}

impl RawMatch {
    fn into_record(self) -> Option<MatchRecord> {
        // Both timestamps present means the match has been played and
        // scored; anything else is upcoming or in progress.
        let start = self.actual_start_time?;
        let post = self.post_result_time?;
        let id = normalize_id(&self.tournament_level, &self.description, self.match_number);
        let mut teams_red = Vec::new();
        let mut teams_blue = Vec::new();
        for team in self.teams {
            if team.station.starts_with("Red") {
                teams_red.push(team.team_number);
            } else if team.station.starts_with("Blue") {
                teams_blue.push(team.team_number);
            }
        }
        Some(MatchRecord {
            id,
            start,
            post,
            teams_red,
            teams_blue,
            is_replay: self.is_replay,
        })
    }
}

impl FmsClient {
    pub fn new(config: FmsConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    /// Fetch all played matches at both tournament levels.
    ///
    /// An event that has not started yet returns an empty schedule (or
    /// a 404 before it exists at all); both normalize to an empty list
    /// so the caller just polls again.
    pub async fn fetch_schedule(&self) -> ServiceResult<Vec<MatchRecord>> {
        let mut records = Vec::new();
        for level in LEVELS {
            records.extend(self.fetch_level(level).await?);
        }
        records.sort_by_key(|r| r.start);
        debug!(count = records.len(), "fetched played matches");
        Ok(records)
    }

    async fn fetch_level(&self, level: &str) -> ServiceResult<Vec<MatchRecord>> {
        let url = format!(
            "{}/{}/matches/{}",
            self.config.base_url, self.config.season, self.config.event_code
        );
        let response = self
            .http
            .get(&url)
            .query(&[("tournamentLevel", level)])
            .header("Authorization", self.config.auth_header())
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(level, "schedule not published yet");
                Ok(Vec::new())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Auth(format!(
                "schedule API rejected credentials ({})",
                response.status()
            ))),
            status if status.is_success() => {
                let body = response.text().await?;
                match serde_json::from_str::<RawScheduleResponse>(&body) {
                    Ok(parsed) => Ok(parsed
                        .matches
                        .into_iter()
                        .filter_map(RawMatch::into_record)
                        .collect()),
                    Err(e) => {
                        warn!(level, error = %e, "schedule response did not decode, treating as empty");
                        Ok(Vec::new())
                    }
                }
            }
            status => Err(ServiceError::UpstreamUnavailable(format!(
                "schedule API returned {}",
                status
            ))),
        }
    }
}
