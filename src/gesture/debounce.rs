use std::time::Duration;

use tokio::time::Instant;

use super::GestureSignal;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    signal: GestureSignal,
    since: Instant,
}

/// Turns per-frame classifications into committed transitions.
///
/// A raw signal is committed once it has been the latest classification for
/// the whole settle window. Losing the hand commits `none` straight away.
#[derive(Debug, Clone)]
pub struct Debouncer {
    settle: Duration,
    committed: GestureSignal,
    pending: Option<Pending>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}

impl Debouncer {
    pub fn new(settle: Duration) -> Self {
        Debouncer {
            settle,
            committed: GestureSignal::NoGesture,
            pending: None,
        }
    }

    pub fn committed(&self) -> GestureSignal {
        self.committed
    }

    pub fn pending(&self) -> Option<GestureSignal> {
        self.pending.map(|p| p.signal)
    }

    /// When the pending signal will be committed if nothing else arrives.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.since + self.settle)
    }

    /// Feeds the classification of a frame in which a hand was found.
    pub fn observe_hand(&mut self, raw: GestureSignal, now: Instant) -> Option<GestureSignal> {
        if raw == self.committed {
            self.pending = None;
            return None;
        }

        match self.pending {
            Some(pending) if pending.signal == raw => {}
            _ => {
                self.pending = Some(Pending {
                    signal: raw,
                    since: now,
                });
            }
        }
        self.poll(now)
    }

    /// Feeds a frame without a hand.
    pub fn observe_no_hand(&mut self) -> Option<GestureSignal> {
        self.pending = None;
        if self.committed.is_none() {
            return None;
        }
        self.committed = GestureSignal::NoGesture;
        Some(GestureSignal::NoGesture)
    }

    /// Commits the pending signal if its settle window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<GestureSignal> {
        let pending = self.pending?;
        if now < pending.since + self.settle {
            return None;
        }
        self.pending = None;
        self.committed = pending.signal;
        Some(pending.signal)
    }
}
