//! VOD window download via streamlink.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use matchcut_models::{format_hms, DownloadWindow};

use crate::error::{MediaError, MediaResult};

fn streamlink_args(video_id: &str, window: &DownloadWindow, output: &Path) -> Vec<String> {
    vec![
        "--hls-start-offset".to_string(),
        format_hms(window.start_seconds),
        "--hls-duration".to_string(),
        format_hms(window.duration_seconds),
        "--force".to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
        format!("https://www.twitch.tv/videos/{}", video_id),
        "best".to_string(),
    ]
}

/// Download a planned window of a VOD segment to `output`.
pub async fn download_vod_window(
    video_id: &str,
    window: &DownloadWindow,
    output: &Path,
) -> MediaResult<()> {
    which::which("streamlink").map_err(|_| MediaError::StreamlinkNotFound)?;

    let args = streamlink_args(video_id, window, output);
    debug!(video = video_id, start = window.start_seconds, duration = window.duration_seconds, "downloading VOD window");

    let result = Command::new("streamlink")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        return Err(MediaError::DownloadFailed {
            message: format!(
                "streamlink exited with {:?}: {}",
                result.status.code(),
                String::from_utf8_lossy(&result.stderr)
            ),
        });
    }
    if !output.exists() {
        return Err(MediaError::DownloadFailed {
            message: format!("streamlink produced no file at {}", output.display()),
        });
    }

    info!(video = video_id, output = %output.display(), "VOD window downloaded");
    Ok(())
}
