//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

#[derive(Debug, Clone)]
enum Input {
    /// A file on disk, with optional per-input flags.
    File { args: Vec<String>, path: PathBuf },
    /// A synthesized lavfi source, e.g. a solid color canvas.
    Lavfi(String),
}

/// Builder for ffmpeg invocations.
///
/// Supports multiple inputs so overlays and synthesized canvases can
/// be combined in one run.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a file input.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(Input::File {
            args: Vec::new(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add a file input with flags placed before its `-i`.
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input::File {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add a lavfi-synthesized input.
    pub fn lavfi(mut self, spec: impl Into<String>) -> Self {
        self.inputs.push(Input::Lavfi(spec.into()));
        self
    }

    /// Add an output argument (after all inputs).
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.arg("-filter_complex").arg(filter)
    }

    pub fn map(self, label: impl Into<String>) -> Self {
        self.arg("-map").arg(label)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.arg("-crf").arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.arg("-preset").arg(preset)
    }

    /// Emit a fixed number of video frames.
    pub fn frames(self, n: u32) -> Self {
        self.arg("-frames:v").arg(n.to_string())
    }

    pub fn no_overwrite(mut self) -> Self {
        self.overwrite = false;
        self
    }

    /// Build the argument vector, without the program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.overwrite {
            args.push("-y".to_string());
        } else {
            args.push("-n".to_string());
        }
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            match input {
                Input::File { args: pre, path } => {
                    args.extend(pre.iter().cloned());
                    args.push("-i".to_string());
                    args.push(path.to_string_lossy().to_string());
                }
                Input::Lavfi(spec) => {
                    args.push("-f".to_string());
                    args.push("lavfi".to_string());
                    args.push("-i".to_string());
                    args.push(spec.clone());
                }
            }
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }

    /// Run ffmpeg to completion, surfacing stderr on failure.
    pub async fn run(&self) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = self.build_args();
        debug!(output = %self.output.display(), "running ffmpeg");

        let result = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::FfmpegFailed {
                message: format!("writing {}", self.output.display()),
                stderr: Some(String::from_utf8_lossy(&result.stderr).to_string()),
                exit_code: result.status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_single_input() {
        let args = FfmpegCommand::new("/tmp/out.mp4")
            .input("/tmp/in.mp4")
            .filter_complex("[0:v]trim=start=1[v]")
            .map("[v]")
            .video_codec("libx264")
            .crf(18)
            .build_args();

        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-i", "/tmp/in.mp4", "-filter_complex",
                "[0:v]trim=start=1[v]", "-map", "[v]", "-c:v", "libx264", "-crf", "18",
                "/tmp/out.mp4",
            ]
        );
    }

    #[test]
    fn test_build_args_lavfi_and_overlay_input() {
        let args = FfmpegCommand::new("/tmp/thumb.png")
            .lavfi("color=c=0x0a0a23:s=1920x1080:d=1")
            .input_with_args(["-loop", "1"], "/tmp/logo.png")
            .frames(1)
            .build_args();

        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-f", "lavfi", "-i", "color=c=0x0a0a23:s=1920x1080:d=1",
                "-loop", "1", "-i", "/tmp/logo.png", "-frames:v", "1", "/tmp/thumb.png",
            ]
        );
    }

    #[test]
    fn test_no_overwrite_flag() {
        let args = FfmpegCommand::new("/tmp/out.mp4")
            .input("/tmp/in.mp4")
            .no_overwrite()
            .build_args();
        assert_eq!(args[0], "-n");
    }
}
