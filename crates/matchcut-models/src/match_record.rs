//! Match records, ids, fingerprints and title formatting.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tournament round a match belongs to. Ordered by tournament
/// progression: qualifications, then playoffs, then finals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Round {
    Qualification,
    Playoff,
    Final,
}

impl Round {
    /// Single-letter code used in match ids (`Q41`, `P6`, `F1`).
    pub fn letter(&self) -> char {
        match self {
            Round::Qualification => 'Q',
            Round::Playoff => 'P',
            Round::Final => 'F',
        }
    }

    /// Human-readable round name used in video titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Round::Qualification => "Quals",
            Round::Playoff => "Playoffs",
            Round::Final => "Finals",
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'Q' => Some(Round::Qualification),
            'P' => Some(Round::Playoff),
            'F' => Some(Round::Final),
            _ => None,
        }
    }
}

/// Match identifier, unique within an event: round code plus number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MatchId {
    pub round: Round,
    pub number: u32,
}

impl MatchId {
    pub fn new(round: Round, number: u32) -> Self {
        Self { round, number }
    }

    /// Translate to the results-tracking (TBA) match key.
    ///
    /// `Q41 -> qm41`, `P6 -> sf6m1`, `F1 -> f1m1`. The elimination game
    /// index is always `m1`.
    pub fn tba_key(&self) -> String {
        match self.round {
            Round::Qualification => format!("qm{}", self.number),
            Round::Playoff => format!("sf{}m1", self.number),
            Round::Final => format!("f{}m1", self.number),
        }
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.round.letter(), self.number)
    }
}

/// Error parsing a match id string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchIdError {
    #[error("match id is empty")]
    Empty,
    #[error("unknown round code '{0}', expected one of Q, P, F")]
    UnknownRound(char),
    #[error("invalid match number in '{0}'")]
    InvalidNumber(String),
}

impl FromStr for MatchId {
    type Err = MatchIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars.next().ok_or(MatchIdError::Empty)?;
        let round = Round::from_letter(letter.to_ascii_uppercase())
            .ok_or(MatchIdError::UnknownRound(letter))?;
        let number: u32 = chars
            .as_str()
            .parse()
            .map_err(|_| MatchIdError::InvalidNumber(s.to_string()))?;
        Ok(MatchId { round, number })
    }
}

impl TryFrom<String> for MatchId {
    type Error = MatchIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MatchId> for String {
    fn from(id: MatchId) -> String {
        id.to_string()
    }
}

/// One played match as reported by the schedule API.
///
/// Immutable once produced; identity within an event is by `id`. `start`
/// is always at or before `post`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    /// Wall-clock time match play began.
    pub start: NaiveDateTime,
    /// Wall-clock time the scores were posted.
    pub post: NaiveDateTime,
    pub teams_red: Vec<u32>,
    pub teams_blue: Vec<u32>,
    /// Replay flag where the schedule API reports one.
    pub is_replay: Option<bool>,
}

impl MatchRecord {
    /// Seconds of match play (`post - start`).
    pub fn match_seconds(&self) -> f64 {
        (self.post - self.start).num_milliseconds() as f64 / 1000.0
    }

    /// Deterministic, file-name-safe dedup key: `event_id_HHMM`.
    ///
    /// A pure function of `(event_code, id, start)`, so repeated
    /// discovery of the same match always yields the same fingerprint.
    pub fn fingerprint(&self, event_code: &str) -> String {
        format!(
            "{}_{}_{:02}{:02}",
            event_code,
            self.id,
            self.start.hour(),
            self.start.minute()
        )
    }

    /// Human-readable hosting-service title, e.g.
    /// `Quals 41 | 2024 FIN Tippecanoe District`. A trailing `R` marks an
    /// explicitly flagged replay.
    pub fn video_title(&self, event_title: &str, year: u16) -> String {
        let replay = if self.is_replay == Some(true) { "R" } else { "" };
        format!(
            "{} {}{} | {} {}",
            self.id.round.display_name(),
            self.id.number,
            replay,
            year,
            event_title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, hour: u32, min: u32) -> MatchRecord {
        let start = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(hour, min, 17)
            .unwrap();
        MatchRecord {
            id: id.parse().unwrap(),
            start,
            post: start + chrono::Duration::seconds(155),
            teams_red: vec![1501, 868, 4272],
            teams_blue: vec![135, 45, 7457],
            is_replay: None,
        }
    }

    #[test]
    fn test_match_id_parse_and_display() {
        let id: MatchId = "Q41".parse().unwrap();
        assert_eq!(id.round, Round::Qualification);
        assert_eq!(id.number, 41);
        assert_eq!(id.to_string(), "Q41");

        assert_eq!("P6".parse::<MatchId>().unwrap().to_string(), "P6");
        assert_eq!("F1".parse::<MatchId>().unwrap().to_string(), "F1");
        assert!(matches!(
            "X3".parse::<MatchId>(),
            Err(MatchIdError::UnknownRound('X'))
        ));
        assert!(matches!(
            "Q".parse::<MatchId>(),
            Err(MatchIdError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_match_id_ordering() {
        let mut ids: Vec<MatchId> = ["F1", "Q2", "P13", "Q41", "P1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let sorted: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(sorted, vec!["Q2", "Q41", "P1", "P13", "F1"]);
    }

    #[test]
    fn test_tba_key_translation() {
        assert_eq!("Q41".parse::<MatchId>().unwrap().tba_key(), "qm41");
        assert_eq!("P6".parse::<MatchId>().unwrap().tba_key(), "sf6m1");
        assert_eq!("F1".parse::<MatchId>().unwrap().tba_key(), "f1m1");
        assert_eq!("F2".parse::<MatchId>().unwrap().tba_key(), "f2m1");
    }

    #[test]
    fn test_fingerprint_is_pure_and_stable() {
        let m = record("Q41", 15, 4);
        let first = m.fingerprint("INTIP");
        assert_eq!(first, "INTIP_Q41_1504");
        // Repeated derivation from an equivalent record is identical.
        let again = record("Q41", 15, 4).fingerprint("INTIP");
        assert_eq!(first, again);
    }

    #[test]
    fn test_fingerprint_distinguishes_start_minute() {
        let a = record("Q41", 15, 4).fingerprint("INTIP");
        let b = record("Q41", 15, 5).fingerprint("INTIP");
        assert_ne!(a, b);
    }

    #[test]
    fn test_video_title() {
        let m = record("Q41", 9, 0);
        assert_eq!(
            m.video_title("FIN Tippecanoe District", 2024),
            "Quals 41 | 2024 FIN Tippecanoe District"
        );

        let mut replay = record("F2", 17, 30);
        replay.is_replay = Some(true);
        assert_eq!(
            replay.video_title("FIN Tippecanoe District", 2024),
            "Finals 2R | 2024 FIN Tippecanoe District"
        );
    }
}
