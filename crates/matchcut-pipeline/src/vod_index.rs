//! Shared index of the channel's VOD segments.
//!
//! A refresh task repopulates the index every fifteen minutes; the
//! builder locates footage in whatever snapshot is current.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use matchcut_models::VideoSegment;
use matchcut_services::ServiceResult;

/// How often the VOD list is re-fetched.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A segment older than this relative to the match start is suspect:
/// the stream was probably restarted under a different VOD.
const STALE_AFTER: chrono::Duration = chrono::Duration::hours(24);

/// Source of VOD segment listings.
pub trait SegmentSource: Send + Sync + 'static {
    fn refresh(&self) -> impl Future<Output = ServiceResult<Vec<VideoSegment>>> + Send;
}

/// Result of locating a match in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct LocateReport {
    /// The segment containing the match start.
    pub segment: VideoSegment,
    /// The score post fell in a different (or no) segment.
    pub straddle: bool,
    /// The segment began more than a day before the match.
    pub stale: bool,
}

/// Thread-shared snapshot of the channel's VOD segments, newest first.
#[derive(Clone, Default)]
pub struct VodIndex {
    segments: Arc<RwLock<Vec<VideoSegment>>>,
}

impl VodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot, keeping newest-first order.
    pub async fn replace(&self, mut segments: Vec<VideoSegment>) {
        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut guard = self.segments.write().await;
        *guard = segments;
    }

    pub async fn is_empty(&self) -> bool {
        self.segments.read().await.is_empty()
    }

    /// Find the segment holding a match, newest segment first.
    ///
    /// Returns `None` when no segment contains the match start. When
    /// the start and the score post land in different segments the
    /// start-containing segment is returned with the straddle flag set;
    /// the caller decides whether a truncated clip is acceptable.
    pub async fn locate(&self, start: NaiveDateTime, post: NaiveDateTime) -> Option<LocateReport> {
        let segments = self.segments.read().await;

        let holder = segments.iter().find(|s| s.contains(start))?;
        let straddle = !holder.contains(post);
        let stale = start - holder.created_at > STALE_AFTER;
        Some(LocateReport {
            segment: holder.clone(),
            straddle,
            stale,
        })
    }
}

/// Spawn the periodic refresh task. The index is populated once
/// immediately, then every [`REFRESH_INTERVAL`] until shutdown.
pub fn spawn_refresh<S: SegmentSource>(
    index: VodIndex,
    source: S,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("VOD refresh task stopping");
                        break;
                    }
                }
                _ = interval.tick() => {
                    match source.refresh().await {
                        Ok(segments) => {
                            info!(count = segments.len(), "refreshed VOD index");
                            index.replace(segments).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "VOD refresh failed, keeping previous snapshot");
                        }
                    }
                }
            }
        }
    })
}
