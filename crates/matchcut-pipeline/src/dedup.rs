//! Append-only dedup logs.
//!
//! Two fingerprint logs survive restarts: the seek log (matches already
//! queued this run) and the send log (matches already published, ever).
//! At startup the send log is copied over the seek log so a crashed run
//! re-discovers anything it clipped but never published.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// One append-only fingerprint log, one fingerprint per line.
pub struct DedupLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DedupLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a fingerprint has already been logged.
    pub async fn is_seen(&self, fingerprint: &str) -> std::io::Result<bool> {
        let _guard = self.lock.lock().await;
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text.lines().any(|line| line.trim() == fingerprint)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Append a fingerprint.
    pub async fn mark_seen(&self, fingerprint: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", fingerprint).as_bytes())
            .await?;
        file.flush().await
    }

    /// Number of fingerprints logged so far.
    pub async fn count(&self) -> std::io::Result<usize> {
        let _guard = self.lock.lock().await;
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Reset the seek log from the send log.
///
/// Publishing is the durable milestone: anything in the send log stays
/// deduplicated, anything that was only seeked (queued or clipped but
/// never published) becomes eligible again.
pub async fn reset_seek_from_send(seek: &DedupLog, send: &DedupLog) -> std::io::Result<()> {
    let sent = match fs::read_to_string(send.path()).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    fs::write(seek.path(), &sent).await?;
    info!(
        published = sent.lines().filter(|l| !l.trim().is_empty()).count(),
        "seek log reset from send log"
    );
    Ok(())
}
