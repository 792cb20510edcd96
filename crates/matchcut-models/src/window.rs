//! Pure timing math: download windows and cut plans.
//!
//! All functions here are deterministic over their inputs so the same
//! match always produces the same window, however many times it is
//! replanned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Observed lag between wall-clock match times and the stream, in
/// seconds. Schedule timestamps run this far ahead of the footage.
pub const STREAM_DELAY_CORRECTION: f64 = 3.0;

/// HLS segment granularity. Downloads snap to this boundary so the
/// first frame of the clip lands on a segment edge.
pub const SEGMENT_SECONDS: f64 = 10.0;

/// Residuals above this are treated as sitting on the next boundary
/// and the download is started one segment earlier.
pub const BOUNDARY_GUARD: f64 = 9.0;

/// Per-program clip timing, in seconds relative to match start and
/// score post.
///
/// `seconds_before_post` is a signed offset from the post time; it is
/// typically negative so the score cut begins shortly before the
/// scores appear on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingProfile {
    pub seconds_before_start: f64,
    pub seconds_of_match: f64,
    pub seconds_after_end: f64,
    pub seconds_before_post: f64,
    pub seconds_after_post: f64,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self {
            seconds_before_start: 3.0,
            seconds_of_match: 155.0,
            seconds_after_end: 5.0,
            seconds_before_post: -7.25,
            seconds_after_post: 23.92,
        }
    }
}

/// Errors produced when a window cannot be planned or does not fit
/// the footage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("match starts {0:.2}s before the segment begins")]
    BeforeSegmentStart(f64),
    #[error("cut range starts at {0:.2}s, before the start of the file")]
    NegativeStart(f64),
    #[error("cut range ends at {end:.2}s but the file is only {file:.2}s long")]
    ExceedsFile { end: f64, file: f64 },
    #[error("cut range is inverted ({start:.2}s .. {end:.2}s)")]
    Inverted { start: f64, end: f64 },
}

/// A planned VOD download: where in the segment to start, how much to
/// pull, and where the match start lands inside the resulting file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadWindow {
    /// Offset into the VOD segment, snapped to a segment boundary.
    pub start_seconds: f64,
    /// Length of footage to download, padded past the score window.
    pub duration_seconds: f64,
    /// Position of the match start within the downloaded file.
    pub match_start_in_file: f64,
}

/// Plan the download window for a match that begins
/// `seconds_into_segment` after the containing VOD segment started
/// and whose scores posted `match_seconds` after it began.
pub fn plan_download(
    seconds_into_segment: f64,
    match_seconds: f64,
    timing: &TimingProfile,
) -> Result<DownloadWindow, WindowError> {
    let start_offset =
        seconds_into_segment + STREAM_DELAY_CORRECTION - timing.seconds_before_start;
    if start_offset < 0.0 {
        return Err(WindowError::BeforeSegmentStart(-start_offset));
    }

    let trim = start_offset.rem_euclid(SEGMENT_SECONDS);
    let mut boundary = (start_offset.ceil() / SEGMENT_SECONDS).floor() * SEGMENT_SECONDS;
    // A residual in the guard band means ceil() crossed into the next
    // segment; step back so the window still covers the lead-in.
    if trim > BOUNDARY_GUARD {
        boundary -= SEGMENT_SECONDS;
    }

    let post_end_offset = match_seconds + timing.seconds_after_post;
    let duration_seconds =
        (((trim + post_end_offset) / SEGMENT_SECONDS).floor() + 2.0) * SEGMENT_SECONDS;

    Ok(DownloadWindow {
        start_seconds: boundary,
        duration_seconds,
        match_start_in_file: trim + timing.seconds_before_start,
    })
}

/// The two ranges to cut from a footage file, in file seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPlan {
    pub match_start: f64,
    pub match_end: f64,
    pub score_start: f64,
    pub score_end: f64,
}

impl CutPlan {
    pub fn match_length(&self) -> f64 {
        self.match_end - self.match_start
    }

    pub fn score_length(&self) -> f64 {
        self.score_end - self.score_start
    }

    /// Check both ranges fit inside a file of `file_duration` seconds.
    pub fn validate(&self, file_duration: f64) -> Result<(), WindowError> {
        for (start, end) in [
            (self.match_start, self.match_end),
            (self.score_start, self.score_end),
        ] {
            if start < 0.0 {
                return Err(WindowError::NegativeStart(start));
            }
            if end <= start {
                return Err(WindowError::Inverted { start, end });
            }
            if end > file_duration {
                return Err(WindowError::ExceedsFile {
                    end,
                    file: file_duration,
                });
            }
        }
        Ok(())
    }
}

/// Plan the cut ranges for a match whose play begins at
/// `match_start_in_file` seconds into the footage file.
///
/// The match range uses the profile's nominal match length; the score
/// range uses the observed `match_seconds` so it tracks the actual
/// post time.
pub fn plan_cut(match_start_in_file: f64, match_seconds: f64, timing: &TimingProfile) -> CutPlan {
    let post_in_file = match_start_in_file + match_seconds;
    CutPlan {
        match_start: match_start_in_file - timing.seconds_before_start,
        match_end: match_start_in_file + timing.seconds_of_match + timing.seconds_after_end,
        score_start: post_in_file + timing.seconds_before_post,
        score_end: post_in_file + timing.seconds_after_post,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn boundary_of(seconds_into_segment: f64) -> (f64, f64) {
        // Default profile has before_start == STREAM_DELAY_CORRECTION,
        // so start_offset == seconds_into_segment here.
        let w = plan_download(seconds_into_segment, 155.0, &TimingProfile::default()).unwrap();
        (w.start_seconds, w.match_start_in_file - 3.0)
    }

    #[test]
    fn test_boundary_snapping() {
        let (boundary, trim) = boundary_of(123.4);
        assert_eq!(boundary, 120.0);
        assert!(close(trim, 3.4));
        // Residual in the guard band steps back one segment.
        let (boundary, trim) = boundary_of(119.5);
        assert_eq!(boundary, 110.0);
        assert!(close(trim, 9.5));
        // Exactly 9.0 stays on the computed boundary.
        let (boundary, trim) = boundary_of(129.0);
        assert_eq!(boundary, 120.0);
        assert!(close(trim, 9.0));
        // Exact boundary yields zero residual.
        let (boundary, trim) = boundary_of(130.0);
        assert_eq!(boundary, 130.0);
        assert!(close(trim, 0.0));
    }

    #[test]
    fn test_download_duration_padding() {
        let timing = TimingProfile::default();
        let w = plan_download(500.0, 155.0, &timing).unwrap();
        // trim = 0, post end = 155 + 23.92, (17 + 2) * 10.
        assert_eq!(w.start_seconds, 500.0);
        assert_eq!(w.duration_seconds, 190.0);
        assert!(close(w.match_start_in_file, 3.0));

        let w = plan_download(123.4, 155.0, &timing).unwrap();
        // trim = 3.4, (18 + 2) * 10.
        assert_eq!(w.duration_seconds, 200.0);
        assert!(close(w.match_start_in_file, 6.4));
    }

    #[test]
    fn test_download_rejects_pre_segment_start() {
        let timing = TimingProfile {
            seconds_before_start: 10.0,
            ..TimingProfile::default()
        };
        assert!(matches!(
            plan_download(2.0, 155.0, &timing),
            Err(WindowError::BeforeSegmentStart(_))
        ));
    }

    #[test]
    fn test_cut_plan_lengths() {
        let timing = TimingProfile::default();
        let plan = plan_cut(50.0, 155.0, &timing);
        assert!(close(plan.match_length(), 163.0));
        assert!(close(plan.score_length(), 31.17));
        assert!(close(plan.match_start, 47.0));
        assert!(close(plan.score_start, 50.0 + 155.0 - 7.25));
        assert!(close(plan.score_end, 50.0 + 155.0 + 23.92));
    }

    #[test]
    fn test_cut_plan_validation() {
        let timing = TimingProfile::default();
        let plan = plan_cut(50.0, 155.0, &timing);
        assert!(plan.validate(300.0).is_ok());
        assert!(matches!(
            plan.validate(200.0),
            Err(WindowError::ExceedsFile { .. })
        ));

        let short = plan_cut(1.0, 155.0, &timing);
        assert!(matches!(
            short.validate(300.0),
            Err(WindowError::NegativeStart(_))
        ));
    }
}
