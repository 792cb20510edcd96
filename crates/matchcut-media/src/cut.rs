//! Two-range clip assembly: match play plus the score reveal, joined
//! in a single ffmpeg filter graph with audio fades.

use std::path::Path;
use tracing::{debug, info};

use matchcut_models::CutPlan;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Audio fade-in at the head of the match range.
pub const FADE_IN_SECONDS: f64 = 0.5;
/// Audio fade-out at the tail of the score range.
pub const FADE_OUT_SECONDS: f64 = 2.0;

/// Build the trim/concat filter graph for a cut plan.
fn concat_filter(plan: &CutPlan) -> String {
    let fade_out_start = (plan.score_length() - FADE_OUT_SECONDS).max(0.0);
    format!(
        "[0:v]trim=start={ms:.3}:end={me:.3},setpts=PTS-STARTPTS[v0];\
         [0:a]atrim=start={ms:.3}:end={me:.3},asetpts=PTS-STARTPTS,afade=t=in:st=0:d={fi:.3}[a0];\
         [0:v]trim=start={ss:.3}:end={se:.3},setpts=PTS-STARTPTS[v1];\
         [0:a]atrim=start={ss:.3}:end={se:.3},asetpts=PTS-STARTPTS,afade=t=out:st={fo:.3}:d={fd:.3}[a1];\
         [v0][a0][v1][a1]concat=n=2:v=1:a=1[v][a]",
        ms = plan.match_start,
        me = plan.match_end,
        ss = plan.score_start,
        se = plan.score_end,
        fi = FADE_IN_SECONDS,
        fo = fade_out_start,
        fd = FADE_OUT_SECONDS,
    )
}

/// Cut the match and score ranges out of `source` into `output`.
///
/// The plan is checked against the probed file duration first so a
/// short download surfaces as a retryable range error instead of a
/// silent truncated clip. An existing output is never overwritten.
pub async fn cut_clip(source: &Path, output: &Path, plan: &CutPlan) -> MediaResult<()> {
    if output.exists() {
        debug!(output = %output.display(), "clip already exists, skipping cut");
        return Ok(());
    }

    let file_duration = probe_duration(source).await?;
    plan.validate(file_duration).map_err(MediaError::ClipRange)?;

    FfmpegCommand::new(output)
        .input(source)
        .filter_complex(concat_filter(plan))
        .map("[v]")
        .map("[a]")
        .video_codec("libx264")
        .preset("veryfast")
        .crf(18)
        .audio_codec("aac")
        .args(["-b:a", "192k"])
        .run()
        .await?;

    info!(
        output = %output.display(),
        match_length = plan.match_length(),
        score_length = plan.score_length(),
        "clip written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchcut_models::{plan_cut, TimingProfile};

    #[test]
    fn test_concat_filter_shape() {
        let plan = plan_cut(50.0, 155.0, &TimingProfile::default());
        let filter = concat_filter(&plan);

        assert!(filter.contains("[0:v]trim=start=47.000:end=210.000"));
        assert!(filter.contains("afade=t=in:st=0:d=0.500"));
        // Score range: 197.750 .. 228.920, fade out 2s before its end.
        assert!(filter.contains("atrim=start=197.750:end=228.920"));
        assert!(filter.contains("afade=t=out:st=29.170:d=2.000"));
        assert!(filter.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[v][a]"));
    }

    #[test]
    fn test_fade_out_clamps_on_short_score_range() {
        let plan = CutPlan {
            match_start: 0.0,
            match_end: 10.0,
            score_start: 10.0,
            score_end: 11.0,
        };
        let filter = concat_filter(&plan);
        assert!(filter.contains("afade=t=out:st=0.000"));
    }
}
