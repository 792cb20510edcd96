//! Run-level progress accounting.
//!
//! Workers report stage transitions through [`PipelineCounters`], which
//! forwards each one to an observer. The core carries no presentation
//! dependency; the binary installs the log-line observer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;

use matchcut_models::MatchId;

/// Lifecycle stage of one match as it moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovered,
    Built,
    Skipped,
    DeadLettered,
    Published,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub discovered: usize,
    pub built: usize,
    pub skipped: usize,
    pub dead_lettered: usize,
    pub published: usize,
}

/// Receiver of stage transitions.
pub trait ProgressObserver: Send + Sync {
    fn on_stage(&self, match_id: MatchId, stage: Stage, counters: CountersSnapshot);
}

/// Default observer: one structured log line per transition.
#[derive(Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_stage(&self, match_id: MatchId, stage: Stage, counters: CountersSnapshot) {
        info!(
            match_id = %match_id,
            stage = ?stage,
            discovered = counters.discovered,
            built = counters.built,
            published = counters.published,
            "stage complete"
        );
    }
}

/// Shared counters plus the observer they report to.
pub struct PipelineCounters {
    discovered: AtomicUsize,
    built: AtomicUsize,
    skipped: AtomicUsize,
    dead_lettered: AtomicUsize,
    published: AtomicUsize,
    observer: Box<dyn ProgressObserver>,
}

impl PipelineCounters {
    pub fn new() -> Arc<Self> {
        Self::with_observer(Box::new(LogObserver))
    }

    pub fn with_observer(observer: Box<dyn ProgressObserver>) -> Arc<Self> {
        Arc::new(Self {
            discovered: AtomicUsize::new(0),
            built: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            dead_lettered: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
            observer,
        })
    }

    /// Seed the published count from a prior run's send log.
    pub fn seed_published(&self, count: usize) {
        self.published.store(count, Ordering::Relaxed);
    }

    pub fn record(&self, match_id: MatchId, stage: Stage) {
        let counter = match stage {
            Stage::Discovered => &self.discovered,
            Stage::Built => &self.built,
            Stage::Skipped => &self.skipped,
            Stage::DeadLettered => &self.dead_lettered,
            Stage::Published => &self.published,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.observer.on_stage(match_id, stage, self.snapshot());
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            built: self.built.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}
