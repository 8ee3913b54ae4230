//! Per-path replay cursors.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free cursor into an ordered response sequence.
///
/// `advance` is a compare-and-increment: racing callers always observe
/// distinct, strictly increasing positions, and the cursor never moves past
/// the sequence length.
#[derive(Default)]
pub struct Cursor(AtomicUsize);

impl Cursor {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Current position (number of responses already consumed)
    #[must_use]
    pub fn position(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Claim the current position and move past it.
    ///
    /// Returns `None` when the cursor already sits at `len`.
    #[must_use]
    pub fn advance(&self, len: usize) -> Option<usize> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| {
                (pos < len).then_some(pos + 1)
            })
            .ok()
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.position()).finish()
    }
}

/// Why a request could not be answered from the capture
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsumeError {
    #[error("No recorded responses for origin {origin}")]
    UnknownOrigin { origin: String },
    #[error("No recorded responses for path {path} on origin {origin}")]
    UnknownPath { origin: String, path: String },
    #[error("Recorded responses exhausted for {origin}{path}: all {recorded} already served")]
    Exhausted {
        origin: String,
        path: String,
        recorded: usize,
    },
}

impl ConsumeError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ConsumeError::UnknownOrigin { .. } => "unknown_origin",
            ConsumeError::UnknownPath { .. } => "unknown_path",
            ConsumeError::Exhausted { .. } => "exhausted",
        }
    }
}
