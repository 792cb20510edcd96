//! Media tooling: downloading VOD windows, cutting clips, probing
//! files and rendering thumbnails, all by shelling out to ffmpeg,
//! ffprobe and streamlink.

pub mod command;
pub mod cut;
pub mod download;
pub mod error;
pub mod probe;
pub mod thumbnail;

pub use command::FfmpegCommand;
pub use cut::{cut_clip, FADE_IN_SECONDS, FADE_OUT_SECONDS};
pub use download::download_vod_window;
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use thumbnail::{render_thumbnail, ThumbnailSpec};
