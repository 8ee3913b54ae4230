//! Shared replay state: the capture index plus the reset broadcast.

use super::cursor::ConsumeError;
use crate::capture::{CaptureIndex, Origin, ResponseRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::info;

/// State shared by every replay listener and the admin API
pub struct ReplayState {
    index: CaptureIndex,
    /// Fired on every reset so open connections close after their in-flight response
    reset_tx: broadcast::Sender<()>,
    reset_count: AtomicU64,
}

impl ReplayState {
    pub fn new(index: CaptureIndex) -> Self {
        let (reset_tx, _) = broadcast::channel(16);
        Self {
            index,
            reset_tx,
            reset_count: AtomicU64::new(0),
        }
    }

    pub fn index(&self) -> &CaptureIndex {
        &self.index
    }

    pub fn consume_next(&self, origin: &Origin, path: &str) -> Result<&ResponseRecord, ConsumeError> {
        self.index.consume_next(origin, path)
    }

    /// Rewind every cursor and ask open connections to close.
    ///
    /// Cursors are reset before the broadcast, so any request issued after
    /// this returns sees the first recorded responses again.
    pub fn reset_all(&self) {
        self.index.reset_cursors();
        let count = self.reset_count.fetch_add(1, Ordering::Relaxed) + 1;
        let connections = self.reset_tx.send(()).unwrap_or(0);
        info!(
            "Replay cursors reset (reset #{}, {} open connections signalled)",
            count, connections
        );
    }

    /// Subscribe a connection to reset notifications
    pub fn subscribe_resets(&self) -> broadcast::Receiver<()> {
        self.reset_tx.subscribe()
    }

    pub fn reset_count(&self) -> u64 {
        self.reset_count.load(Ordering::Relaxed)
    }
}
