//! Publisher: uploads built clips and registers the results.
//!
//! Upload is the one non-repeatable side effect in the pipeline, so it
//! is never retried speculatively: a failed upload is logged and
//! dropped, and the startup seek-log reset makes the next run rebuild
//! and try again. Thumbnails, playlists and results registration are
//! all best-effort.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use matchcut_media::{render_thumbnail, ThumbnailSpec};
use matchcut_models::MatchRecord;
use matchcut_services::{ServiceResult, TbaClient, UploadRequest, YouTubeClient};

use crate::builder::BuiltClip;
use crate::config::Program;
use crate::dedup::DedupLog;
use crate::progress::{PipelineCounters, Stage};
use crate::queue::PipelineQueue;

/// How long the publisher waits on its queue before re-checking
/// shutdown.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts at appending to the send log before giving up. Losing the
/// entry risks a duplicate upload next run, so it is worth insisting.
const MARK_SENT_ATTEMPTS: u32 = 3;

/// A video hosting service.
pub trait VideoHost: Send + Sync + 'static {
    fn upload(&self, request: &UploadRequest) -> impl Future<Output = ServiceResult<String>> + Send;
    fn set_thumbnail(
        &self,
        video_id: &str,
        image: &Path,
    ) -> impl Future<Output = ServiceResult<()>> + Send;
    fn add_to_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> impl Future<Output = ServiceResult<()>> + Send;
}

impl VideoHost for YouTubeClient {
    fn upload(&self, request: &UploadRequest) -> impl Future<Output = ServiceResult<String>> + Send {
        self.upload_video(request)
    }

    fn set_thumbnail(
        &self,
        video_id: &str,
        image: &Path,
    ) -> impl Future<Output = ServiceResult<()>> + Send {
        YouTubeClient::set_thumbnail(self, video_id, image)
    }

    fn add_to_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> impl Future<Output = ServiceResult<()>> + Send {
        YouTubeClient::add_to_playlist(self, playlist_id, video_id)
    }
}

/// A match-results tracker accepting video registrations.
pub trait ResultsSink: Send + Sync + 'static {
    fn register(
        &self,
        videos: &BTreeMap<String, String>,
    ) -> impl Future<Output = ServiceResult<()>> + Send;
}

impl ResultsSink for TbaClient {
    fn register(
        &self,
        videos: &BTreeMap<String, String>,
    ) -> impl Future<Output = ServiceResult<()>> + Send {
        self.add_match_videos(videos)
    }
}

/// Event-level knobs the publisher needs.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub program: Program,
    pub event_code: String,
    pub event_title: String,
    pub season: u16,
    /// Operator-supplied tags; event and program tags are appended
    /// per clip.
    pub tags: Vec<String>,
    pub playlist_id: Option<String>,
    pub thumbnail_background: Option<PathBuf>,
    pub thumbnail_logo: Option<PathBuf>,
    pub work_dir: PathBuf,
}

/// The upload worker.
pub struct Publisher<H, R> {
    host: H,
    results: Option<R>,
    config: PublisherConfig,
    send_log: Arc<DedupLog>,
    queue: Arc<PipelineQueue<BuiltClip>>,
    counters: Arc<PipelineCounters>,
}

fn description(record: &MatchRecord, event_title: &str, season: u16) -> String {
    let mut text = format!(
        "{} {} at the {} {}.",
        record.id.round.display_name(),
        record.id.number,
        season,
        event_title
    );
    if !record.teams_red.is_empty() || !record.teams_blue.is_empty() {
        let join = |teams: &[u32]| {
            teams
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        text.push_str(&format!(
            "\n\nRed alliance: {}\nBlue alliance: {}",
            join(&record.teams_red),
            join(&record.teams_blue)
        ));
    }
    text
}

impl<H: VideoHost, R: ResultsSink> Publisher<H, R> {
    pub fn new(
        host: H,
        results: Option<R>,
        config: PublisherConfig,
        send_log: Arc<DedupLog>,
        queue: Arc<PipelineQueue<BuiltClip>>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            host,
            results,
            config,
            send_log,
            queue,
            counters,
        }
    }

    /// Render the thumbnail for a clip, best-effort.
    async fn thumbnail_for(&self, record: &MatchRecord) -> Option<PathBuf> {
        let spec = ThumbnailSpec {
            background: self.config.thumbnail_background.clone(),
            logo: self.config.thumbnail_logo.clone(),
            event_title: format!("{} {}", self.config.season, self.config.event_title),
            match_label: format!(
                "{} {}",
                record.id.round.display_name(),
                record.id.number
            ),
            teams_red: record.teams_red.clone(),
            teams_blue: record.teams_blue.clone(),
        };
        let path = self
            .config
            .work_dir
            .join("thumbnails")
            .join(format!("{}.png", record.fingerprint(&self.config.event_code)));
        match render_thumbnail(&spec, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(match_id = %record.id, error = %e, "thumbnail render failed, uploading without one");
                None
            }
        }
    }

    fn video_tags(&self, record: &MatchRecord) -> Vec<String> {
        let mut tags = self.config.tags.clone();
        tags.push(self.config.event_code.clone());
        tags.push(self.config.season.to_string());
        tags.push(record.id.to_string());
        tags.push(self.config.program.short_name().to_string());
        tags.push(self.config.program.long_name().to_string());
        tags
    }

    async fn mark_sent(&self, fingerprint: &str) {
        for attempt in 1..=MARK_SENT_ATTEMPTS {
            match self.send_log.mark_seen(fingerprint).await {
                Ok(()) => return,
                Err(e) if attempt < MARK_SENT_ATTEMPTS => {
                    warn!(fingerprint, attempt, error = %e, "send log append failed, retrying");
                }
                Err(e) => {
                    error!(
                        fingerprint,
                        error = %e,
                        "send log append failed; this match may be re-uploaded next run"
                    );
                }
            }
        }
    }

    /// Publish one clip end to end.
    pub async fn process(&self, clip: BuiltClip) {
        let record = &clip.record;
        let fingerprint = record.fingerprint(&self.config.event_code);

        match self.send_log.is_seen(&fingerprint).await {
            Ok(true) => {
                info!(match_id = %record.id, "already published, skipping");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "send log read failed, proceeding with upload");
            }
        }

        let thumbnail = self.thumbnail_for(record).await;

        let request = UploadRequest {
            path: clip.path.clone(),
            title: record.video_title(&self.config.event_title, self.config.season),
            description: description(record, &self.config.event_title, self.config.season),
            tags: self.video_tags(record),
        };
        let video_id = match self.host.upload(&request).await {
            Ok(id) => id,
            Err(e) => {
                // No speculative retry: the upload may have partially
                // landed. The next run rebuilds and tries again.
                error!(match_id = %record.id, error = %e, "upload failed, dropping clip");
                return;
            }
        };

        if let Some(thumb) = thumbnail {
            if let Err(e) = self.host.set_thumbnail(&video_id, &thumb).await {
                warn!(match_id = %record.id, error = %e, "thumbnail upload failed");
            }
        }
        if let Some(playlist_id) = &self.config.playlist_id {
            if let Err(e) = self.host.add_to_playlist(playlist_id, &video_id).await {
                warn!(match_id = %record.id, error = %e, "playlist insert failed");
            }
        }
        if let Some(sink) = &self.results {
            let mut videos = BTreeMap::new();
            videos.insert(record.id.tba_key(), video_id.clone());
            if let Err(e) = sink.register(&videos).await {
                warn!(match_id = %record.id, error = %e, "results registration failed");
            }
        }

        self.mark_sent(&fingerprint).await;
        self.counters.record(record.id, Stage::Published);
        info!(match_id = %record.id, video = %video_id, "published");
    }

    /// Consume the publish queue until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("publisher stopping");
                        break;
                    }
                }
                item = self.queue.recv_timeout(RECV_TIMEOUT) => {
                    if let Some(clip) = item {
                        self.process(clip).await;
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
    use matchcut_models::{MatchId, Round};
    use matchcut_services::ServiceError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubHost {
        fail_upload: bool,
        uploads: Mutex<Vec<String>>,
        playlist_adds: Mutex<Vec<(String, String)>>,
    }

    impl VideoHost for Arc<StubHost> {
        fn upload(
            &self,
            request: &UploadRequest,
        ) -> impl Future<Output = ServiceResult<String>> + Send {
            let title = request.title.clone();
            let this = Arc::clone(self);
            async move {
                if this.fail_upload {
                    return Err(ServiceError::RequestFailed("quota exceeded".into()));
                }
                this.uploads.lock().unwrap().push(title);
                Ok("vid123".to_string())
            }
        }

        fn set_thumbnail(
            &self,
            _video_id: &str,
            _image: &Path,
        ) -> impl Future<Output = ServiceResult<()>> + Send {
            async { Ok(()) }
        }

        fn add_to_playlist(
            &self,
            playlist_id: &str,
            video_id: &str,
        ) -> impl Future<Output = ServiceResult<()>> + Send {
            let this = Arc::clone(self);
            let pair = (playlist_id.to_string(), video_id.to_string());
            async move {
                this.playlist_adds.lock().unwrap().push(pair);
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct StubSink {
        registrations: Mutex<Vec<BTreeMap<String, String>>>,
    }

    impl ResultsSink for Arc<StubSink> {
        fn register(
            &self,
            videos: &BTreeMap<String, String>,
        ) -> impl Future<Output = ServiceResult<()>> + Send {
            let this = Arc::clone(self);
            let videos = videos.clone();
            async move {
                this.registrations.lock().unwrap().push(videos);
                Ok(())
            }
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn clip(dir: &tempfile::TempDir) -> BuiltClip {
        let path = dir.path().join("INTIP_Q41_1504.mp4");
        std::fs::write(&path, b"clip").unwrap();
        BuiltClip {
            record: MatchRecord {
                id: MatchId::new(Round::Qualification, 41),
                start: at(15, 4),
                post: at(15, 7),
                teams_red: vec![1501, 868, 4272],
                teams_blue: vec![135, 45, 7457],
                is_replay: None,
            },
            path,
        }
    }

    fn publisher(
        dir: &tempfile::TempDir,
        host: Arc<StubHost>,
        sink: Option<Arc<StubSink>>,
    ) -> Publisher<Arc<StubHost>, Arc<StubSink>> {
        Publisher::new(
            host,
            sink,
            PublisherConfig {
                program: Program::Frc,
                event_code: "INTIP".into(),
                event_title: "FIN Tippecanoe District".into(),
                season: 2024,
                tags: vec!["robotics".into()],
                playlist_id: Some("PLxyz".into()),
                thumbnail_background: None,
                thumbnail_logo: None,
                work_dir: dir.path().to_path_buf(),
            },
            Arc::new(DedupLog::new(dir.path().join("send.txt"))),
            Arc::new(PipelineQueue::new()),
            PipelineCounters::new(),
        )
    }

    #[tokio::test]
    async fn test_process_uploads_registers_and_marks_sent() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost::default());
        let sink = Arc::new(StubSink::default());
        let publisher = publisher(&dir, Arc::clone(&host), Some(Arc::clone(&sink)));

        publisher.process(clip(&dir)).await;

        assert_eq!(
            host.uploads.lock().unwrap().as_slice(),
            ["Quals 41 | 2024 FIN Tippecanoe District"]
        );
        assert_eq!(
            host.playlist_adds.lock().unwrap().as_slice(),
            [("PLxyz".to_string(), "vid123".to_string())]
        );
        let registrations = sink.registrations.lock().unwrap();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].get("qm41").unwrap(), "vid123");
        drop(registrations);

        assert!(publisher
            .send_log
            .is_seen("INTIP_Q41_1504")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_upload_failure_is_dropped_without_marking() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost {
            fail_upload: true,
            ..StubHost::default()
        });
        let sink = Arc::new(StubSink::default());
        let publisher = publisher(&dir, Arc::clone(&host), Some(Arc::clone(&sink)));

        publisher.process(clip(&dir)).await;

        assert!(host.uploads.lock().unwrap().is_empty());
        assert!(sink.registrations.lock().unwrap().is_empty());
        assert!(!publisher
            .send_log
            .is_seen("INTIP_Q41_1504")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_already_published_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost::default());
        let publisher = publisher(&dir, Arc::clone(&host), None);

        publisher.send_log.mark_seen("INTIP_Q41_1504").await.unwrap();
        publisher.process(clip(&dir)).await;

        assert!(host.uploads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_video_tags_include_event_and_program() {
        let dir = tempfile::tempdir().unwrap();
        let p = publisher(&dir, Arc::new(StubHost::default()), None);
        let c = clip(&dir);
        let tags = p.video_tags(&c.record);
        for expected in ["robotics", "INTIP", "2024", "Q41", "FRC", "FIRST Robotics Competition"] {
            assert!(tags.iter().any(|t| t == expected), "missing tag {expected}");
        }
    }

    #[test]
    fn test_description_lists_alliances() {
        let c = clip(&tempfile::tempdir().unwrap());
        let text = description(&c.record, "FIN Tippecanoe District", 2024);
        assert!(text.starts_with("Quals 41 at the 2024 FIN Tippecanoe District."));
        assert!(text.contains("Red alliance: 1501, 868, 4272"));
        assert!(text.contains("Blue alliance: 135, 45, 7457"));
    }
}
