//! Builder: turns queued matches into clip files.
//!
//! Live mode locates the match in the VOD index, downloads the padded
//! window with streamlink, then cuts it; static mode cuts straight from
//! the local recording. Retryable failures ride back onto the queue a
//! bounded number of times, spaced so each attempt sees refreshed
//! footage instead of burning the whole budget against one snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use matchcut_media::{cut_clip, download_vod_window, MediaError, MediaResult};
use matchcut_models::{plan_cut, plan_download, MatchRecord, TimingProfile, VideoAsset};

use crate::progress::{PipelineCounters, Stage};
use crate::queue::PipelineQueue;
use crate::vod_index::{VodIndex, REFRESH_INTERVAL};

/// Builds are retried this many times before dead-lettering.
pub const MAX_BUILD_ATTEMPTS: u32 = 3;

/// How long the builder waits on its queue before re-checking shutdown.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// Spacing between attempts at the same match. Immediate retries would
/// see the same footage; the next attempt waits for a refreshed VOD
/// listing.
pub const RETRY_DELAY: Duration = REFRESH_INTERVAL;

/// Pause before re-offering a match found while the VOD index was
/// still empty, giving the first refresh a chance to land.
const EMPTY_INDEX_WAIT: Duration = Duration::from_secs(60);

/// A match waiting to be built, with its retry count.
#[derive(Debug, Clone)]
pub struct QueuedMatch {
    pub record: MatchRecord,
    pub attempts: u32,
}

impl QueuedMatch {
    pub fn new(record: MatchRecord) -> Self {
        Self { record, attempts: 0 }
    }

    /// The next attempt, or `None` once the budget is spent.
    pub fn retry(mut self) -> Option<Self> {
        self.attempts += 1;
        (self.attempts < MAX_BUILD_ATTEMPTS).then_some(self)
    }
}

/// A finished clip handed to the publisher.
#[derive(Debug, Clone)]
pub struct BuiltClip {
    pub record: MatchRecord,
    pub path: PathBuf,
}

/// Where the builder gets footage from.
pub enum Footage {
    Live(VodIndex),
    Static(VideoAsset),
}

enum BuildOutcome {
    Built(PathBuf),
    /// Permanently unbuildable (footage does not cover the match).
    Skipped,
    /// The VOD index has no listing yet. Not a failed attempt: the
    /// match is parked and re-offered once the index can have filled.
    NotReady,
}

/// The clip-building worker.
pub struct Builder {
    footage: Footage,
    timing: TimingProfile,
    event_code: String,
    work_dir: PathBuf,
    clips_dir: PathBuf,
    in_queue: Arc<PipelineQueue<QueuedMatch>>,
    out_queue: Arc<PipelineQueue<BuiltClip>>,
    counters: Arc<PipelineCounters>,
}

impl Builder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        footage: Footage,
        timing: TimingProfile,
        event_code: String,
        work_dir: PathBuf,
        clips_dir: PathBuf,
        in_queue: Arc<PipelineQueue<QueuedMatch>>,
        out_queue: Arc<PipelineQueue<BuiltClip>>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            footage,
            timing,
            event_code,
            work_dir,
            clips_dir,
            in_queue,
            out_queue,
            counters,
        }
    }

    fn clip_path(&self, record: &MatchRecord) -> PathBuf {
        self.clips_dir
            .join(format!("{}.mp4", record.fingerprint(&self.event_code)))
    }

    async fn build_one(&self, record: &MatchRecord) -> MediaResult<BuildOutcome> {
        match &self.footage {
            Footage::Live(index) => self.build_live(index, record).await,
            Footage::Static(asset) => self.build_static(asset, record).await,
        }
    }

    async fn build_live(&self, index: &VodIndex, record: &MatchRecord) -> MediaResult<BuildOutcome> {
        let output = self.clip_path(record);
        if output.exists() {
            info!(match_id = %record.id, "clip already built, forwarding");
            return Ok(BuildOutcome::Built(output));
        }

        let report = match index.locate(record.start, record.post).await {
            Some(report) => report,
            None => {
                if index.is_empty().await {
                    return Ok(BuildOutcome::NotReady);
                }
                return Err(MediaError::DownloadFailed {
                    message: format!("no VOD segment contains match {} start", record.id),
                });
            }
        };
        if report.straddle {
            warn!(
                match_id = %record.id,
                segment = %report.segment.id,
                "match straddles a segment boundary, clip may cut off early"
            );
        }
        if report.stale {
            warn!(
                match_id = %record.id,
                segment = %report.segment.id,
                "segment began more than a day before the match, check stream restarts"
            );
        }

        let seconds_into = report.segment.seconds_into(record.start);
        let window = plan_download(seconds_into, record.match_seconds(), &self.timing)?;

        let raw = self
            .work_dir
            .join(format!("{}_raw.mp4", record.fingerprint(&self.event_code)));
        download_vod_window(&report.segment.id, &window, &raw).await?;

        let plan = plan_cut(window.match_start_in_file, record.match_seconds(), &self.timing);
        let result = cut_clip(&raw, &output, &plan).await;
        if let Err(e) = tokio::fs::remove_file(&raw).await {
            warn!(error = %e, path = %raw.display(), "could not remove raw download");
        }
        result?;
        Ok(BuildOutcome::Built(output))
    }

    async fn build_static(
        &self,
        asset: &VideoAsset,
        record: &MatchRecord,
    ) -> MediaResult<BuildOutcome> {
        if !asset
            .timeline
            .covers(record.start, record.post, &self.timing)
        {
            warn!(
                match_id = %record.id,
                "recording does not cover this match, skipping permanently"
            );
            return Ok(BuildOutcome::Skipped);
        }

        let output = self.clip_path(record);
        if output.exists() {
            info!(match_id = %record.id, "clip already built, forwarding");
            return Ok(BuildOutcome::Built(output));
        }

        let offset = asset.timeline.offset_of(record.start);
        let plan = plan_cut(offset, record.match_seconds(), &self.timing);
        cut_clip(&asset.path, &output, &plan).await?;
        Ok(BuildOutcome::Built(output))
    }

    async fn handle(&self, queued: QueuedMatch) {
        let record = queued.record.clone();
        match self.build_one(&record).await {
            Ok(BuildOutcome::Built(path)) => {
                self.counters.record(record.id, Stage::Built);
                self.out_queue.push(BuiltClip { record, path });
            }
            Ok(BuildOutcome::Skipped) => {
                self.counters.record(record.id, Stage::Skipped);
            }
            Ok(BuildOutcome::NotReady) => {
                info!(
                    match_id = %record.id,
                    "VOD index is empty, parking match until it fills"
                );
                let queue = Arc::clone(&self.in_queue);
                tokio::spawn(async move {
                    tokio::time::sleep(EMPTY_INDEX_WAIT).await;
                    queue.push(queued);
                });
            }
            Err(e) if e.is_retryable() => match queued.retry() {
                Some(again) => {
                    warn!(
                        match_id = %record.id,
                        attempt = again.attempts,
                        error = %e,
                        "build failed, retrying after the next footage refresh"
                    );
                    let queue = Arc::clone(&self.in_queue);
                    tokio::spawn(async move {
                        tokio::time::sleep(RETRY_DELAY).await;
                        queue.push(again);
                    });
                }
                None => {
                    error!(match_id = %record.id, error = %e, "build attempts exhausted");
                    self.counters.record(record.id, Stage::DeadLettered);
                }
            },
            Err(e) => {
                error!(match_id = %record.id, error = %e, "build failed permanently");
                self.counters.record(record.id, Stage::DeadLettered);
            }
        }
    }

    /// Consume the build queue until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("builder stopping");
                        break;
                    }
                }
                item = self.in_queue.recv_timeout(RECV_TIMEOUT) => {
                    if let Some(queued) = item {
                        self.handle(queued).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use matchcut_models::{AssetTimeline, MatchId, Round, VideoSegment};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn record(number: u32, start: NaiveDateTime) -> MatchRecord {
        MatchRecord {
            id: MatchId::new(Round::Qualification, number),
            start,
            post: start + chrono::Duration::seconds(155),
            teams_red: vec![],
            teams_blue: vec![],
            is_replay: None,
        }
    }

    fn static_builder(dir: &tempfile::TempDir, duration: f64) -> Builder {
        let asset_path = dir.path().join("recording.mp4");
        std::fs::write(&asset_path, b"fake video").unwrap();
        let clips_dir = dir.path().join("clips");
        std::fs::create_dir_all(&clips_dir).unwrap();
        Builder::new(
            Footage::Static(VideoAsset {
                path: asset_path,
                timeline: AssetTimeline {
                    anchor_wall: at(9, 0, 0),
                    anchor_offset_seconds: 0.0,
                    duration_seconds: duration,
                },
            }),
            TimingProfile::default(),
            "INTIP".into(),
            dir.path().to_path_buf(),
            clips_dir,
            Arc::new(PipelineQueue::new()),
            Arc::new(PipelineQueue::new()),
            PipelineCounters::new(),
        )
    }

    fn live_builder(
        dir: &tempfile::TempDir,
        index: VodIndex,
    ) -> (
        Builder,
        Arc<PipelineQueue<QueuedMatch>>,
        Arc<PipelineCounters>,
    ) {
        let clips_dir = dir.path().join("clips");
        std::fs::create_dir_all(&clips_dir).unwrap();
        let in_queue = Arc::new(PipelineQueue::new());
        let counters = PipelineCounters::new();
        let builder = Builder::new(
            Footage::Live(index),
            TimingProfile::default(),
            "INTIP".into(),
            dir.path().to_path_buf(),
            clips_dir,
            Arc::clone(&in_queue),
            Arc::new(PipelineQueue::new()),
            Arc::clone(&counters),
        );
        (builder, in_queue, counters)
    }

    #[test]
    fn test_retry_budget() {
        let queued = QueuedMatch::new(record(1, at(9, 0, 10)));
        let second = queued.retry().unwrap();
        assert_eq!(second.attempts, 1);
        let third = second.retry().unwrap();
        assert_eq!(third.attempts, 2);
        assert!(third.retry().is_none());
    }

    #[tokio::test]
    async fn test_static_skips_uncovered_match() {
        let dir = tempfile::tempdir().unwrap();
        // Recording only 10 minutes long; a 14:00 match is outside it.
        let builder = static_builder(&dir, 600.0);
        let outcome = builder.build_one(&record(40, at(14, 0, 0))).await.unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_existing_clip_is_forwarded_not_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let builder = static_builder(&dir, 3600.0);
        let rec = record(1, at(9, 5, 0));

        let clip = builder.clip_path(&rec);
        std::fs::write(&clip, b"already cut").unwrap();

        let outcome = builder.build_one(&rec).await.unwrap();
        match outcome {
            BuildOutcome::Built(path) => assert_eq!(path, clip),
            BuildOutcome::Skipped | BuildOutcome::NotReady => {
                panic!("expected forward of existing clip")
            }
        }
        // The placeholder content was not overwritten.
        assert_eq!(std::fs::read(&clip).unwrap(), b"already cut");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_waits_for_refreshed_footage() {
        let dir = tempfile::tempdir().unwrap();
        let index = VodIndex::new();
        // The only segment ends at 10:00; the match settled after the
        // snapshot was taken, so locate finds nothing yet.
        index
            .replace(vec![VideoSegment {
                id: "v1".into(),
                created_at: at(9, 0, 0),
                duration_seconds: 3600.0,
            }])
            .await;
        let (builder, in_queue, counters) = live_builder(&dir, index);

        builder.handle(QueuedMatch::new(record(5, at(10, 5, 0)))).await;

        // Not dead-lettered, and not bounced straight back either.
        assert_eq!(counters.snapshot().dead_lettered, 0);
        assert!(in_queue.recv_timeout(Duration::from_secs(1)).await.is_none());

        // The attempt returns once the index can have refreshed.
        let again = in_queue
            .recv_timeout(RETRY_DELAY + Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(again.attempts, 1);
        assert_eq!(again.record.id.to_string(), "Q5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_index_parks_without_spending_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let (builder, in_queue, counters) = live_builder(&dir, VodIndex::new());

        // Cycle through more empty-index waits than the retry budget
        // allows failures; the attempt count never moves.
        let mut queued = QueuedMatch::new(record(5, at(10, 5, 0)));
        for _ in 0..MAX_BUILD_ATTEMPTS + 1 {
            builder.handle(queued).await;
            queued = in_queue
                .recv_timeout(EMPTY_INDEX_WAIT + Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(queued.attempts, 0);
        }
        assert_eq!(counters.snapshot().dead_lettered, 0);
    }

    #[test]
    fn test_clip_path_uses_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let builder = static_builder(&dir, 3600.0);
        let rec = record(41, at(15, 4, 17));
        assert!(builder
            .clip_path(&rec)
            .ends_with("clips/INTIP_Q41_1504.mp4"));
    }
}
