//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use matchcut_models::WindowError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur producing a clip.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH")]
    FfprobeNotFound,

    #[error("streamlink not found in PATH")]
    StreamlinkNotFound,

    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffprobe failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("download failed: {message}")]
    DownloadFailed { message: String },

    /// The planned cut does not fit the footage that was actually
    /// downloaded. Retryable: a later download may cover more.
    #[error("clip range does not fit footage: {0}")]
    ClipRange(#[from] WindowError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid video file: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Whether re-running the build later could succeed. I/O errors
    /// count: a full or briefly unavailable disk can recover.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaError::ClipRange(_) | MediaError::DownloadFailed { .. } | MediaError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let io = MediaError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_retryable());
        assert!(MediaError::DownloadFailed {
            message: "short".into()
        }
        .is_retryable());
        assert!(!MediaError::FfmpegNotFound.is_retryable());
        assert!(!MediaError::InvalidVideo("no duration".into()).is_retryable());
    }
}
