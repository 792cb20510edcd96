//! Footage sources: live VOD segments and static local recordings.

use crate::window::TimingProfile;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One VOD segment as reported by the streaming platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSegment {
    /// Platform video id, used to build the download URL.
    pub id: String,
    /// Wall-clock time the segment started recording.
    pub created_at: NaiveDateTime,
    pub duration_seconds: f64,
}

impl VideoSegment {
    /// Seconds from segment start to `t`. Negative when `t` precedes
    /// the segment.
    pub fn seconds_into(&self, t: NaiveDateTime) -> f64 {
        (t - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        let offset = self.seconds_into(t);
        offset >= 0.0 && offset < self.duration_seconds
    }
}

/// Mapping from wall-clock time into a pre-recorded local file.
///
/// `anchor_wall` is a wall-clock instant known to occur at
/// `anchor_offset_seconds` into the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTimeline {
    pub anchor_wall: NaiveDateTime,
    pub anchor_offset_seconds: f64,
    pub duration_seconds: f64,
}

impl AssetTimeline {
    /// Position of wall-clock time `t` within the recording, in seconds.
    pub fn offset_of(&self, t: NaiveDateTime) -> f64 {
        (t - self.anchor_wall).num_milliseconds() as f64 / 1000.0 + self.anchor_offset_seconds
    }

    /// Whether the recording contains the full cut window for a match
    /// that started at `start` and posted scores at `post`.
    ///
    /// The earliest cut point is usually the match lead-in, but a
    /// sufficiently negative `seconds_before_post` could pull the
    /// score range ahead of it, so both are checked.
    pub fn covers(&self, start: NaiveDateTime, post: NaiveDateTime, timing: &TimingProfile) -> bool {
        let left = (self.offset_of(start) - timing.seconds_before_start)
            .min(self.offset_of(post) + timing.seconds_before_post);
        let right = self.offset_of(post) + timing.seconds_after_post;
        left >= 0.0 && right < self.duration_seconds
    }
}

/// A static local recording plus the timeline that maps match times
/// into it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub timeline: AssetTimeline,
}
