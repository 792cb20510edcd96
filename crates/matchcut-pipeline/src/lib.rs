//! The match clipping pipeline.
//!
//! Three workers connected by in-process queues:
//! - the seeker polls the schedule API and queues settled matches,
//! - the builder turns queued matches into clip files,
//! - the publisher uploads clips and registers the results.
//!
//! Fingerprint logs on disk make the whole thing restartable: published
//! matches stay done, everything else is rediscovered on the next run.

pub mod builder;
pub mod config;
pub mod dedup;
pub mod error;
pub mod progress;
pub mod publisher;
pub mod queue;
pub mod seeker;
pub mod vod_index;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use matchcut_media::probe_duration;
use matchcut_models::{AssetTimeline, VideoAsset, VideoSegment};
use matchcut_services::{
    FmsClient, FmsConfig, ServiceResult, TbaClient, TbaConfig, TwitchClient, TwitchConfig,
    YouTubeClient, YouTubeConfig,
};

pub use builder::{Builder, BuiltClip, Footage, QueuedMatch};
pub use config::{ConfigError, Credentials, EventConfig, Program, VideoSource};
pub use dedup::{reset_seek_from_send, DedupLog};
pub use error::{PipelineError, PipelineResult};
pub use progress::{CountersSnapshot, LogObserver, PipelineCounters, ProgressObserver, Stage};
pub use publisher::{Publisher, PublisherConfig, ResultsSink, VideoHost};
pub use queue::PipelineQueue;
pub use seeker::{ScheduleSource, Seeker};
pub use vod_index::{spawn_refresh, LocateReport, SegmentSource, VodIndex};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Uploads move hundreds of megabytes; give them room.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const TWITCH_ID_URL: &str = "https://id.twitch.tv";
const TWITCH_API_URL: &str = "https://api.twitch.tv/helix";
const YOUTUBE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const YOUTUBE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3";
const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const TBA_BASE_URL: &str = "https://www.thebluealliance.com";

fn schedule_base_url(program: Program) -> &'static str {
    match program {
        Program::Frc => "https://frc-api.firstinspires.org/v3.0",
        Program::Ftc => "https://ftc-api.firstinspires.org/v2.0",
    }
}

/// VOD listing source backed by the Twitch client. The channel's user
/// id is resolved once at startup; a fresh app token is fetched on
/// every refresh so long events never outlive one.
struct TwitchSegmentSource {
    client: TwitchClient,
    user_id: String,
}

impl vod_index::SegmentSource for TwitchSegmentSource {
    fn refresh(&self) -> impl Future<Output = ServiceResult<Vec<VideoSegment>>> + Send {
        async move {
            let token = self.client.fetch_token().await?;
            self.client.list_videos(&token, &self.user_id).await
        }
    }
}

/// Run the pipeline for one event until the shutdown signal flips.
pub async fn run_pipeline(
    config: EventConfig,
    credentials: Credentials,
    shutdown_rx: watch::Receiver<bool>,
    observer: Box<dyn ProgressObserver>,
) -> PipelineResult<()> {
    credentials.validate_for(&config)?;

    tokio::fs::create_dir_all(&config.work_dir).await?;
    tokio::fs::create_dir_all(config.clips_dir()).await?;
    tokio::fs::create_dir_all(config.work_dir.join("thumbnails")).await?;
    tokio::fs::create_dir_all(&config.log_dir).await?;

    let seek_log = Arc::new(DedupLog::new(config.log_dir.join("seek.txt")));
    let send_log = Arc::new(DedupLog::new(config.log_dir.join("send.txt")));
    reset_seek_from_send(&seek_log, &send_log).await?;

    let counters = PipelineCounters::with_observer(observer);
    counters.seed_published(send_log.count().await?);

    let fms = FmsClient::new(FmsConfig {
        base_url: schedule_base_url(config.program).to_string(),
        season: config.season,
        event_code: config.event_code.clone(),
        username: credentials.fms_username.clone(),
        auth_key: credentials.fms_auth_key.clone(),
        timeout: HTTP_TIMEOUT,
    })?;

    let youtube = YouTubeClient::new(YouTubeConfig {
        token_url: YOUTUBE_TOKEN_URL.to_string(),
        upload_base_url: YOUTUBE_UPLOAD_URL.to_string(),
        api_base_url: YOUTUBE_API_URL.to_string(),
        client_id: credentials.youtube_client_id.clone(),
        client_secret: credentials.youtube_client_secret.clone(),
        refresh_token: credentials.youtube_refresh_token.clone(),
        category_id: "28".to_string(),
        privacy: config.privacy.clone(),
        chunk_size: YouTubeConfig::default_chunk_size(),
        timeout: UPLOAD_TIMEOUT,
    })?;

    let tba = match (&config.tba_event_key, &credentials.tba_auth_id) {
        (Some(event_key), Some(auth_id)) => Some(TbaClient::new(TbaConfig {
            base_url: TBA_BASE_URL.to_string(),
            auth_id: auth_id.clone(),
            auth_secret: credentials
                .tba_auth_secret
                .clone()
                .unwrap_or_default(),
            event_key: event_key.clone(),
            timeout: HTTP_TIMEOUT,
        })?),
        _ => None,
    };

    // Resolve the footage source before starting workers so a bad
    // channel name or recording fails the run immediately.
    let mut refresh_task = None;
    let footage = match &config.video_source {
        VideoSource::Live { channel } => {
            let twitch = TwitchClient::new(TwitchConfig {
                id_base_url: TWITCH_ID_URL.to_string(),
                api_base_url: TWITCH_API_URL.to_string(),
                client_id: credentials.twitch_client_id.clone().unwrap_or_default(),
                client_secret: credentials
                    .twitch_client_secret
                    .clone()
                    .unwrap_or_default(),
                utc_offset_hours: config.utc_offset_hours,
                timeout: HTTP_TIMEOUT,
            })?;
            // Resolve the channel now: a typo'd login fails the run
            // here instead of warning inside the refresh task forever.
            let token = twitch.fetch_token().await?;
            let user_id = twitch.user_id(&token, channel).await?;
            let source = TwitchSegmentSource {
                client: twitch,
                user_id,
            };

            let index = VodIndex::new();
            // The refresh task populates the index on its first tick.
            refresh_task = Some(vod_index::spawn_refresh(
                index.clone(),
                source,
                shutdown_rx.clone(),
            ));
            info!(channel, "watching live VOD archive");
            Footage::Live(index)
        }
        VideoSource::Static {
            path,
            anchor_match_id,
            anchor_offset_seconds,
        } => {
            // The anchor match pins wall-clock time to the file: its
            // schedule start time occurs at the configured offset.
            let schedule = fms.fetch_schedule().await?;
            let anchor = schedule
                .iter()
                .find(|m| m.id == *anchor_match_id)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "anchor match {} is not in the played schedule",
                        anchor_match_id
                    ))
                })?;
            let duration_seconds = probe_duration(path).await?;
            info!(
                path = %path.display(),
                duration = duration_seconds,
                anchor = %anchor_match_id,
                "using static recording"
            );
            Footage::Static(VideoAsset {
                path: path.clone(),
                timeline: AssetTimeline {
                    anchor_wall: anchor.start,
                    anchor_offset_seconds: *anchor_offset_seconds,
                    duration_seconds,
                },
            })
        }
    };

    let build_queue = Arc::new(PipelineQueue::new());
    let publish_queue = Arc::new(PipelineQueue::new());

    let seeker = Seeker::new(
        fms,
        config.event_code.clone(),
        Arc::clone(&seek_log),
        Arc::clone(&build_queue),
        Arc::clone(&counters),
    );
    let builder = Builder::new(
        footage,
        config.timing,
        config.event_code.clone(),
        config.work_dir.clone(),
        config.clips_dir(),
        Arc::clone(&build_queue),
        Arc::clone(&publish_queue),
        Arc::clone(&counters),
    );
    let publisher = Publisher::new(
        youtube,
        tba,
        PublisherConfig {
            program: config.program,
            event_code: config.event_code.clone(),
            event_title: config.event_title.clone(),
            season: config.season,
            tags: config.tags.clone(),
            playlist_id: config.playlist_id.clone(),
            thumbnail_background: config.thumbnail_background.clone(),
            thumbnail_logo: config.thumbnail_logo.clone(),
            work_dir: config.work_dir.clone(),
        },
        Arc::clone(&send_log),
        Arc::clone(&publish_queue),
        Arc::clone(&counters),
    );

    info!(event = %config.event_code, season = config.season, "pipeline started");

    let seeker_task = tokio::spawn(seeker.run(shutdown_rx.clone()));
    let builder_task = tokio::spawn(builder.run(shutdown_rx.clone()));
    let publisher_task = tokio::spawn(publisher.run(shutdown_rx.clone()));

    let _ = seeker_task.await;
    let _ = builder_task.await;
    let _ = publisher_task.await;
    if let Some(task) = refresh_task {
        let _ = task.await;
    }

    let snapshot = counters.snapshot();
    info!(
        discovered = snapshot.discovered,
        built = snapshot.built,
        published = snapshot.published,
        skipped = snapshot.skipped,
        dead_lettered = snapshot.dead_lettered,
        "pipeline stopped"
    );
    Ok(())
}
