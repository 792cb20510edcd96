//! Duration string helpers for external tooling.
//!
//! Twitch reports VOD lengths as compact strings like `1h23m45s`;
//! streamlink expects offsets as `H:MM:SS`.

use thiserror::Error;

/// Error parsing a platform duration string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("empty duration string")]
    Empty,
    #[error("unexpected character '{0}' in duration string")]
    UnexpectedChar(char),
    #[error("duration string ends with a dangling number")]
    TrailingNumber,
}

/// Parse a Twitch-style duration (`1h23m45s`, `45m2s`, `58s`) to seconds.
pub fn parse_platform_duration(s: &str) -> Result<f64, DurationParseError> {
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }
    let mut total: u64 = 0;
    let mut acc: u64 = 0;
    let mut have_digits = false;
    for c in s.chars() {
        match c {
            '0'..='9' => {
                acc = acc * 10 + u64::from(c as u8 - b'0');
                have_digits = true;
            }
            'h' | 'm' | 's' if have_digits => {
                let unit = match c {
                    'h' => 3600,
                    'm' => 60,
                    _ => 1,
                };
                total += acc * unit;
                acc = 0;
                have_digits = false;
            }
            _ => return Err(DurationParseError::UnexpectedChar(c)),
        }
    }
    if have_digits {
        return Err(DurationParseError::TrailingNumber);
    }
    Ok(total as f64)
}

/// Format seconds as `H:MM:SS`, truncating fractional seconds.
///
/// This is the offset syntax streamlink accepts for `--hls-start-offset`
/// and `--hls-duration`.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{}:{:02}:{:02}", h, m, s)
}
