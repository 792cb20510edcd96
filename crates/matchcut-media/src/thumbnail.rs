//! Thumbnail rendering.
//!
//! Composes a 1920x1080 frame with ffmpeg: alliance team-number boxes
//! on the right half, the event title top-left, the match label
//! bottom-left, and an optional program logo bottom-right.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;
const BOX_W: u32 = 300;
const BOX_H: u32 = 100;
const RED_X: u32 = 1080;
const BLUE_X: u32 = 1480;
const ROW_Y0: u32 = 75;
const ROW_PITCH: u32 = 150;
const RED_FILL: &str = "0xED1C24";
const BLUE_FILL: &str = "0x0066B3";
const CANVAS_FILL: &str = "0x0a0a23";

/// What to draw on one thumbnail.
#[derive(Debug, Clone)]
pub struct ThumbnailSpec {
    /// Event background image; a solid canvas is synthesized when
    /// absent.
    pub background: Option<PathBuf>,
    /// Program logo overlaid bottom-right.
    pub logo: Option<PathBuf>,
    pub event_title: String,
    /// e.g. `Quals 41`.
    pub match_label: String,
    pub teams_red: Vec<u32>,
    pub teams_blue: Vec<u32>,
}

/// Escape text for use inside a drawtext filter option.
fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '\'' | ':' | ',' | '%' | '[' | ']' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn alliance_rows(filters: &mut Vec<String>, teams: &[u32], x: u32, fill: &str) {
    for (row, team) in teams.iter().enumerate() {
        let y = ROW_Y0 + row as u32 * ROW_PITCH;
        filters.push(format!(
            "drawbox=x={x}:y={y}:w={w}:h={h}:color={fill}@1:t=fill",
            w = BOX_W,
            h = BOX_H,
        ));
        filters.push(format!(
            "drawtext=font=Sans:text={text}:fontsize=48:fontcolor=white:\
             x={x}+({w}-text_w)/2:y={y}+({h}-text_h)/2",
            text = team,
            w = BOX_W,
            h = BOX_H,
        ));
    }
}

/// Build the full filter graph. The base frame is input 0; the logo,
/// when present, is input 1.
fn compose_filter(spec: &ThumbnailSpec) -> String {
    let mut filters = vec![format!("scale={}:{}", WIDTH, HEIGHT)];

    alliance_rows(&mut filters, &spec.teams_red, RED_X, RED_FILL);
    alliance_rows(&mut filters, &spec.teams_blue, BLUE_X, BLUE_FILL);

    // Event title centered on the upper-left quarter point.
    filters.push(format!(
        "drawtext=font=Sans:text={}:fontsize=64:fontcolor=white:\
         x={}-text_w/2:y={}-text_h/2",
        escape_drawtext(&spec.event_title),
        WIDTH / 4,
        HEIGHT / 4,
    ));
    // Match label above the lower-left quarter point.
    filters.push(format!(
        "drawtext=font=Sans:text={}:fontsize=72:fontcolor=white:\
         x={}-text_w/2:y={}",
        escape_drawtext(&spec.match_label),
        WIDTH / 4,
        HEIGHT * 3 / 4 - BOX_H,
    ));

    let base = format!("[0:v]{}[base]", filters.join(","));
    if spec.logo.is_some() {
        format!(
            "{};[base][1:v]overlay=x={}-w/2:y={}-h/2[out]",
            base,
            WIDTH * 3 / 4,
            HEIGHT * 3 / 4,
        )
    } else {
        base
    }
}

/// Render the thumbnail to `output` as a single PNG frame.
pub async fn render_thumbnail(spec: &ThumbnailSpec, output: &Path) -> MediaResult<()> {
    let mut cmd = FfmpegCommand::new(output);
    cmd = match &spec.background {
        Some(bg) => cmd.input(bg),
        None => cmd.lavfi(format!(
            "color=c={}:s={}x{}:d=1",
            CANVAS_FILL, WIDTH, HEIGHT
        )),
    };
    if let Some(logo) = &spec.logo {
        cmd = cmd.input(logo);
    }
    let out_label = if spec.logo.is_some() { "[out]" } else { "[base]" };

    cmd.filter_complex(compose_filter(spec))
        .map(out_label)
        .frames(1)
        .run()
        .await?;

    info!(output = %output.display(), label = %spec.match_label, "thumbnail rendered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ThumbnailSpec {
        ThumbnailSpec {
            background: None,
            logo: None,
            event_title: "2024 FIN Tippecanoe District".into(),
            match_label: "Quals 41".into(),
            teams_red: vec![1501, 868, 4272],
            teams_blue: vec![135, 45, 7457],
        }
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("Quals 41"), "Quals 41");
        assert_eq!(escape_drawtext("a:b"), "a\\:b");
        assert_eq!(escape_drawtext("100%"), "100\\%");
        assert_eq!(escape_drawtext("it's"), "it\\'s");
    }

    #[test]
    fn test_compose_filter_alliance_layout() {
        let filter = compose_filter(&spec());

        // Three red rows at x=1080, stepping 150px from y=75.
        assert!(filter.contains("drawbox=x=1080:y=75:w=300:h=100:color=0xED1C24@1:t=fill"));
        assert!(filter.contains("drawbox=x=1080:y=225:w=300:h=100"));
        assert!(filter.contains("drawbox=x=1080:y=375:w=300:h=100"));
        // Blue column at x=1480.
        assert!(filter.contains("drawbox=x=1480:y=75:w=300:h=100:color=0x0066B3@1:t=fill"));
        assert!(filter.contains("text=1501"));
        assert!(filter.contains("text=7457"));
        // No logo input means the graph ends at the base label.
        assert!(filter.ends_with("[base]"));
    }

    #[test]
    fn test_compose_filter_with_logo_overlay() {
        let mut s = spec();
        s.logo = Some(PathBuf::from("/tmp/logo.png"));
        let filter = compose_filter(&s);
        assert!(filter.contains("[base][1:v]overlay=x=1440-w/2:y=810-h/2[out]"));
    }
}
