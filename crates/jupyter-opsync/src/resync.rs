//! Deferred execution-count resynchronization.
//!
//! The local editor updates its prompt number asynchronously after a cell's
//! outputs land, so the binding re-reads and re-submits the count a short
//! moment after each execution finishes. This is best-effort race
//! mitigation, not a guarantee; it runs entirely outside any gate window.
//! The delay lives behind [`PromptSyncPolicy`] so a host with a real
//! completion acknowledgment can replace the timer without touching the
//! engine.

use std::time::{Duration, Instant};

/// Decides whether and how long to defer a prompt resync.
pub trait PromptSyncPolicy {
    /// `None` disables deferred resync entirely.
    fn delay(&self) -> Option<Duration>;
}

/// The default: wait a short fixed delay for the editor's own asynchronous
/// prompt-number update.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay(Duration::from_millis(20))
    }
}

impl PromptSyncPolicy for FixedDelay {
    fn delay(&self) -> Option<Duration> {
        Some(self.0)
    }
}

/// Resync on the next flush, with no waiting. Useful in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl PromptSyncPolicy for Immediate {
    fn delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Never resync; the host owns prompt consistency itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl PromptSyncPolicy for Disabled {
    fn delay(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug)]
struct PendingPrompt {
    index: usize,
    due: Instant,
}

/// Due-time queue of pending prompt resyncs, pumped by the host.
#[derive(Debug, Default)]
pub(crate) struct DeferredPrompts {
    entries: Vec<PendingPrompt>,
}

impl DeferredPrompts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a resync for `index`. A pending entry for the same index is
    /// replaced; latest due time wins.
    pub fn schedule(&mut self, index: usize, due: Instant) {
        self.entries.retain(|e| e.index != index);
        self.entries.push(PendingPrompt { index, due });
    }

    /// Remove and return the indices of every entry due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<usize> {
        let mut due = Vec::new();
        self.entries.retain(|e| {
            if e.due <= now {
                due.push(e.index);
                false
            } else {
                true
            }
        });
        due
    }

    /// The earliest due time among pending entries.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.due).min()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
