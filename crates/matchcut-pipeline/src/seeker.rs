//! Seeker: polls the schedule and queues newly settled matches.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use matchcut_models::MatchRecord;
use matchcut_services::{FmsClient, ServiceResult};

use crate::builder::QueuedMatch;
use crate::dedup::DedupLog;
use crate::progress::{PipelineCounters, Stage};
use crate::queue::PipelineQueue;

/// How often the schedule is polled.
pub const POLL_INTERVAL: Duration = Duration::from_secs(100);

/// A match is only queued once its score post is at least this old, so
/// the footage (and the VOD listing) has caught up.
pub const SETTLE_SECONDS: i64 = 50;

/// Source of played matches.
pub trait ScheduleSource: Send + Sync + 'static {
    fn fetch_schedule(&self) -> impl Future<Output = ServiceResult<Vec<MatchRecord>>> + Send;
}

impl ScheduleSource for FmsClient {
    fn fetch_schedule(&self) -> impl Future<Output = ServiceResult<Vec<MatchRecord>>> + Send {
        FmsClient::fetch_schedule(self)
    }
}

fn is_settled(record: &MatchRecord, now: NaiveDateTime) -> bool {
    (now - record.post).num_seconds() >= SETTLE_SECONDS
}

/// The schedule-polling worker.
pub struct Seeker<S> {
    source: S,
    event_code: String,
    seek_log: Arc<DedupLog>,
    queue: Arc<PipelineQueue<QueuedMatch>>,
    counters: Arc<PipelineCounters>,
}

impl<S: ScheduleSource> Seeker<S> {
    pub fn new(
        source: S,
        event_code: String,
        seek_log: Arc<DedupLog>,
        queue: Arc<PipelineQueue<QueuedMatch>>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            source,
            event_code,
            seek_log,
            queue,
            counters,
        }
    }

    /// One schedule poll: queue every settled, unseen match. The
    /// fingerprint is logged before the enqueue so a crash between the
    /// two drops the match rather than duplicating it (the startup
    /// reset recovers it on the next run).
    pub async fn poll_once(&self, now: NaiveDateTime) -> usize {
        let records = match self.source.fetch_schedule().await {
            Ok(records) => records,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "schedule fetch failed, will retry next poll");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "schedule fetch failed");
                return 0;
            }
        };

        let mut queued = 0;
        for record in records {
            if !is_settled(&record, now) {
                debug!(match_id = %record.id, "match not settled yet");
                continue;
            }
            let fingerprint = record.fingerprint(&self.event_code);
            match self.seek_log.is_seen(&fingerprint).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, fingerprint, "seek log read failed, skipping this poll");
                    continue;
                }
            }
            if let Err(e) = self.seek_log.mark_seen(&fingerprint).await {
                warn!(error = %e, fingerprint, "seek log append failed, not queueing");
                continue;
            }
            info!(match_id = %record.id, fingerprint, "queueing match for build");
            self.counters.record(record.id, Stage::Discovered);
            self.queue.push(QueuedMatch::new(record));
            queued += 1;
        }
        queued
    }

    /// Poll until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("seeker stopping");
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.poll_once(chrono::Local::now().naive_local()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use matchcut_models::{MatchId, Round};

    struct StubSchedule {
        records: Vec<MatchRecord>,
    }

    impl ScheduleSource for StubSchedule {
        fn fetch_schedule(
            &self,
        ) -> impl Future<Output = ServiceResult<Vec<MatchRecord>>> + Send {
            let records = self.records.clone();
            async move { Ok(records) }
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn record(number: u32, post: NaiveDateTime) -> MatchRecord {
        MatchRecord {
            id: MatchId::new(Round::Qualification, number),
            start: post - chrono::Duration::seconds(155),
            post,
            teams_red: vec![],
            teams_blue: vec![],
            is_replay: None,
        }
    }

    fn seeker(
        records: Vec<MatchRecord>,
        dir: &tempfile::TempDir,
    ) -> (Seeker<StubSchedule>, Arc<PipelineQueue<QueuedMatch>>) {
        let queue = Arc::new(PipelineQueue::new());
        let seeker = Seeker::new(
            StubSchedule { records },
            "INTIP".into(),
            Arc::new(DedupLog::new(dir.path().join("seek.txt"))),
            Arc::clone(&queue),
            PipelineCounters::new(),
        );
        (seeker, queue)
    }

    #[tokio::test]
    async fn test_unsettled_matches_wait() {
        let dir = tempfile::tempdir().unwrap();
        let now = at(10, 0, 0);
        let records = vec![
            record(1, at(9, 50, 0)),  // long settled
            record(2, at(9, 59, 30)), // posted 30s ago, not settled
        ];
        let (seeker, queue) = seeker(records, &dir);

        assert_eq!(seeker.poll_once(now).await, 1);
        let queued = queue.recv_timeout(Duration::from_millis(10)).await.unwrap();
        assert_eq!(queued.record.id.to_string(), "Q1");
        assert!(queue.recv_timeout(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_settled_match_queues_later() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(2, at(9, 59, 30))];
        let (seeker, queue) = seeker(records, &dir);

        assert_eq!(seeker.poll_once(at(10, 0, 0)).await, 0);
        // Next poll, the same match has settled.
        assert_eq!(seeker.poll_once(at(10, 1, 40)).await, 1);
        assert!(queue.recv_timeout(Duration::from_millis(10)).await.is_some());
    }

    #[tokio::test]
    async fn test_seen_matches_are_not_requeued() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(1, at(9, 50, 0))];
        let (seeker, _queue) = seeker(records, &dir);

        assert_eq!(seeker.poll_once(at(10, 0, 0)).await, 1);
        assert_eq!(seeker.poll_once(at(10, 1, 40)).await, 0);
    }
}
