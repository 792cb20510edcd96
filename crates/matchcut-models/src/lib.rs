//! Shared data models for the matchcut pipeline.
//!
//! This crate provides the types that flow between the pipeline stages:
//! - Match records, ids and dedup fingerprints
//! - VOD segments and static video assets
//! - The timing profile and the pure trim-window math
//! - Duration string helpers for external tooling

pub mod duration;
pub mod match_record;
pub mod segment;
pub mod window;

// Re-export common types
pub use duration::{format_hms, parse_platform_duration, DurationParseError};
pub use match_record::{MatchId, MatchIdError, MatchRecord, Round};
pub use segment::{AssetTimeline, VideoAsset, VideoSegment};
pub use window::{plan_cut, plan_download, CutPlan, DownloadWindow, TimingProfile, WindowError};
