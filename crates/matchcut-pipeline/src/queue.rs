//! In-process FIFO queues between the pipeline stages.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Unbounded FIFO queue with a timed receive.
///
/// Senders never block; the consuming worker polls with a timeout so
/// it can also notice shutdown between items.
pub struct PipelineQueue<T> {
    tx: UnboundedSender<T>,
    rx: Mutex<UnboundedReceiver<T>>,
}

impl<T> PipelineQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueue an item. Never blocks; if the receiver is gone the item
    /// is dropped, which only happens during shutdown.
    pub fn push(&self, item: T) {
        let _ = self.tx.send(item);
    }

    /// Receive the next item, or `None` if the wait times out.
    pub async fn recv_timeout(&self, wait: Duration) -> Option<T> {
        let mut rx = self.rx.lock().await;
        timeout(wait, rx.recv()).await.ok().flatten()
    }
}

impl<T> Default for PipelineQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
