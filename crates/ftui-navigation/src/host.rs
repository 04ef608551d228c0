#![forbid(unsafe_code)]

//! Host container contract and an in-memory stack host.
//!
//! The host owns the physical screens. Everything else (the reconciler's
//! correspondence table, local destinations) refers to screens by
//! [`ScreenId`] only.
//!
//! # Transitions
//!
//! An animated pop may leave the host mid-transition. The host then reports
//! [`PopResult::Pending`] and keeps the departing screens until the platform
//! calls [`HostContainer::finish_transition`]. A finished transition hands the
//! removed screens back; a cancelled one (the user let go mid-swipe) puts
//! them back on the stack and returns nothing.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::screen::{Screen, ScreenId};

/// Identifies one in-flight pop transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionToken(pub u64);

impl fmt::Display for TransitionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// How a pop transition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Finished,
    Cancelled,
}

/// Result of a pop primitive.
#[derive(Debug)]
pub enum PopResult<V> {
    /// Screens already left the stack, topmost first.
    Completed(Vec<Screen<V>>),
    /// Screens are animating out; their removal is decided later.
    Pending {
        token: TransitionToken,
        ids: Vec<ScreenId>,
    },
}

impl<V> PopResult<V> {
    /// Ids of the screens leaving the stack.
    #[must_use]
    pub fn ids(&self) -> Vec<ScreenId> {
        match self {
            Self::Completed(screens) => screens.iter().map(Screen::id).collect(),
            Self::Pending { ids, .. } => ids.clone(),
        }
    }
}

/// One slot of a wholesale stack replacement.
pub enum StackEntry<V> {
    /// Keep a screen already in the stack (possibly at a new position).
    Existing(ScreenId),
    /// Insert a newly built screen.
    New(Screen<V>),
}

impl<V> StackEntry<V> {
    #[must_use]
    pub fn id(&self) -> ScreenId {
        match self {
            Self::Existing(id) => *id,
            Self::New(screen) => screen.id(),
        }
    }
}

impl<V> fmt::Debug for StackEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing(id) => f.debug_tuple("Existing").field(id).finish(),
            Self::New(screen) => f.debug_tuple("New").field(&screen.id()).finish(),
        }
    }
}

/// Primitives of a stack-based navigation container.
///
/// The first screen is the permanent root. Pop primitives never remove it.
pub trait HostContainer<V> {
    /// Screens bottom to top.
    fn screens(&self) -> &[Screen<V>];

    fn screen_mut(&mut self, id: ScreenId) -> Option<&mut Screen<V>>;

    fn push(&mut self, screen: Screen<V>, animated: bool);

    /// Replace the whole stack. Returns the screens that are no longer in it.
    ///
    /// `Existing` entries that name a screen not in the stack are skipped.
    fn replace_screens(&mut self, entries: Vec<StackEntry<V>>, animated: bool) -> Vec<Screen<V>>;

    /// Pop the top screen. `None` when only the root remains.
    fn pop(&mut self, animated: bool) -> Option<PopResult<V>>;

    /// Pop everything above `target`. `None` when `target` is absent or
    /// already on top.
    fn pop_to(&mut self, target: ScreenId, animated: bool) -> Option<PopResult<V>>;

    /// Pop everything above the root. `None` when only the root remains.
    fn pop_to_root(&mut self, animated: bool) -> Option<PopResult<V>>;

    /// Settle a pending pop. Returns the removed screens when finished, an
    /// empty list when cancelled, `None` for an unknown token.
    fn finish_transition(
        &mut self,
        token: TransitionToken,
        outcome: TransitionOutcome,
    ) -> Option<Vec<Screen<V>>>;

    fn top(&self) -> Option<ScreenId> {
        self.screens().last().map(Screen::id)
    }

    fn contains(&self, id: ScreenId) -> bool {
        self.screens().iter().any(|screen| screen.id() == id)
    }
}

struct PendingPop<V> {
    /// Stack length the removed screens are restored at on cancel.
    restore_len: usize,
    screens: Vec<Screen<V>>,
}

/// In-memory host stack.
///
/// With `transitions` enabled, animated pops stay pending until
/// [`HostContainer::finish_transition`] is called, the way a platform
/// container defers its completion callback until the animation ends.
pub struct ScreenStack<V> {
    screens: Vec<Screen<V>>,
    transitions: bool,
    pending: FxHashMap<TransitionToken, PendingPop<V>>,
    next_token: u64,
}

impl<V> ScreenStack<V> {
    /// Stack holding only `root`. Pops complete immediately.
    #[must_use]
    pub fn new(root: Screen<V>) -> Self {
        Self {
            screens: vec![root],
            transitions: false,
            pending: FxHashMap::default(),
            next_token: 1,
        }
    }

    /// Defer animated pops until their transition is finished.
    #[must_use]
    pub fn with_transitions(mut self, enabled: bool) -> Self {
        self.transitions = enabled;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.screens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Ids bottom to top.
    #[must_use]
    pub fn ids(&self) -> Vec<ScreenId> {
        self.screens.iter().map(Screen::id).collect()
    }

    /// Tokens of transitions still running.
    #[must_use]
    pub fn pending_transitions(&self) -> Vec<TransitionToken> {
        self.pending.keys().copied().collect()
    }

    fn truncate_to(&mut self, keep: usize, animated: bool) -> Option<PopResult<V>> {
        if keep >= self.screens.len() {
            return None;
        }
        let mut removed = self.screens.split_off(keep);
        removed.reverse();
        if animated && self.transitions {
            let token = TransitionToken(self.next_token);
            self.next_token += 1;
            let ids = removed.iter().map(Screen::id).collect();
            debug!(token = %token, count = removed.len(), "pop transition started");
            self.pending.insert(
                token,
                PendingPop {
                    restore_len: keep,
                    screens: removed,
                },
            );
            Some(PopResult::Pending { token, ids })
        } else {
            Some(PopResult::Completed(removed))
        }
    }
}

impl<V> HostContainer<V> for ScreenStack<V> {
    fn screens(&self) -> &[Screen<V>] {
        &self.screens
    }

    fn screen_mut(&mut self, id: ScreenId) -> Option<&mut Screen<V>> {
        self.screens.iter_mut().find(|screen| screen.id() == id)
    }

    fn push(&mut self, screen: Screen<V>, _animated: bool) {
        self.screens.push(screen);
    }

    fn replace_screens(&mut self, entries: Vec<StackEntry<V>>, _animated: bool) -> Vec<Screen<V>> {
        let mut old: Vec<Option<Screen<V>>> = self.screens.drain(..).map(Some).collect();
        let mut next = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                StackEntry::Existing(id) => {
                    let found = old
                        .iter_mut()
                        .find(|slot| slot.as_ref().is_some_and(|s| s.id() == id))
                        .and_then(Option::take);
                    if let Some(screen) = found {
                        next.push(screen);
                    }
                }
                StackEntry::New(screen) => next.push(screen),
            }
        }
        self.screens = next;
        old.into_iter().flatten().collect()
    }

    fn pop(&mut self, animated: bool) -> Option<PopResult<V>> {
        if self.screens.len() <= 1 {
            return None;
        }
        let keep = self.screens.len() - 1;
        self.truncate_to(keep, animated)
    }

    fn pop_to(&mut self, target: ScreenId, animated: bool) -> Option<PopResult<V>> {
        let position = self.screens.iter().position(|s| s.id() == target)?;
        self.truncate_to(position + 1, animated)
    }

    fn pop_to_root(&mut self, animated: bool) -> Option<PopResult<V>> {
        self.truncate_to(1, animated)
    }

    fn finish_transition(
        &mut self,
        token: TransitionToken,
        outcome: TransitionOutcome,
    ) -> Option<Vec<Screen<V>>> {
        let pending = self.pending.remove(&token)?;
        debug!(token = %token, ?outcome, "pop transition settled");
        match outcome {
            TransitionOutcome::Finished => Some(pending.screens),
            TransitionOutcome::Cancelled => {
                let at = pending.restore_len.min(self.screens.len());
                let tail = self.screens.split_off(at);
                self.screens.extend(pending.screens.into_iter().rev());
                self.screens.extend(tail);
                Some(Vec::new())
            }
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ScreenStack<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenStack")
            .field("screens", &self.screens)
            .field("transitions", &self.transitions)
            .field("pending", &self.pending.len())
            .finish()
    }
}
