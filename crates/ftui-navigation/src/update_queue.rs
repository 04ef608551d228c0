#![forbid(unsafe_code)]

//! Classification and coalescing of external path updates.
//!
//! Every external update carries the whole candidate path. It is classified
//! once, against the reconciler's current path length:
//!
//! - **Structural** (length differs): stored as the pending update,
//!   replacing any earlier pending one, and applied after a trailing quiet
//!   period. Intermediate paths in a burst are never applied.
//! - **Content-only** (length equal): applied immediately. Any pending
//!   structural update is dropped, since the latest external value no
//!   longer asks for a structural change.
//!
//! The two routes are exclusive, so no event is ever applied twice.

use std::time::{Duration, Instant};

use tracing::debug;

/// How an update was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction<D> {
    /// Apply this path now as an in-place content refresh.
    Content(Vec<D>),
    /// Apply this path now as a structural reconcile (no debounce).
    Structural(Vec<D>),
    /// Held for the trailing debounce window.
    Deferred,
}

/// Trailing debounce holding the latest structural path.
#[derive(Debug)]
pub struct PathDebouncer<D> {
    debounce: Duration,
    last_event: Option<Instant>,
    pending: Option<Vec<D>>,
}

impl<D> PathDebouncer<D> {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_event: None,
            pending: None,
        }
    }

    /// Hold `path`, restarting the quiet period.
    pub fn hold_at(&mut self, path: Vec<D>, now: Instant) {
        self.pending = Some(path);
        self.last_event = Some(now);
    }

    /// Release the held path once the quiet period has elapsed.
    pub fn tick_at(&mut self, now: Instant) -> Option<Vec<D>> {
        let last = self.last_event?;
        if now.saturating_duration_since(last) < self.debounce {
            return None;
        }
        self.last_event = None;
        self.pending.take()
    }

    /// Time left before the held path is released.
    #[must_use]
    pub fn time_until_apply(&self, now: Instant) -> Option<Duration> {
        self.pending.as_ref()?;
        let last = self.last_event?;
        let elapsed = now.saturating_duration_since(last);
        Some(self.debounce.saturating_sub(elapsed))
    }

    /// Drop the held path. Returns whether one was held.
    pub fn cancel(&mut self) -> bool {
        self.last_event = None;
        self.pending.take().is_some()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Routes external path updates to exactly one handler.
#[derive(Debug)]
pub struct UpdateQueue<D> {
    debouncer: PathDebouncer<D>,
    immediate: bool,
}

impl<D> UpdateQueue<D> {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debouncer: PathDebouncer::new(debounce),
            immediate: debounce.is_zero(),
        }
    }

    /// Classify `path` against the current path length `current_len`.
    pub fn send_at(&mut self, path: Vec<D>, current_len: usize, now: Instant) -> UpdateAction<D> {
        if path.len() == current_len {
            if self.debouncer.cancel() {
                debug!(len = current_len, "pending structural update superseded");
            }
            return UpdateAction::Content(path);
        }
        if self.immediate {
            return UpdateAction::Structural(path);
        }
        debug!(from = current_len, to = path.len(), "structural update deferred");
        self.debouncer.hold_at(path, now);
        UpdateAction::Deferred
    }

    /// Release a structural update whose quiet period has elapsed.
    pub fn flush_at(&mut self, now: Instant) -> Option<Vec<D>> {
        self.debouncer.tick_at(now)
    }

    #[must_use]
    pub fn time_until_flush(&self, now: Instant) -> Option<Duration> {
        self.debouncer.time_until_apply(now)
    }

    /// Drop any pending structural update.
    pub fn cancel(&mut self) -> bool {
        self.debouncer.cancel()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}
