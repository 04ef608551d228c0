#![forbid(unsafe_code)]

//! Two-way synchronization between a path and a physical screen stack.
//!
//! The [`StackReconciler`] owns the host container, a mirror of the path, and
//! a correspondence table from [`ScreenId`] to path index.
//!
//! # Path to stack
//!
//! [`StackReconciler::set_desired_path`] compares the new path's length with
//! the mirror:
//!
//! - Different length: a structural reconcile builds the whole new stack.
//!   Each slot reuses the screen currently mapped to that index when it was
//!   built from the same identity key (content refreshed in place, no
//!   remount); otherwise a new screen is built. The host stack is replaced in
//!   one call.
//! - Same length: a content-only refresh updates each mapped screen in place
//!   and leaves the stack structure alone.
//!
//! # Stack to path
//!
//! Pops and wholesale replacements issued through the reconciler (user swipe
//! back, back button, local destinations) remove the departed screens' rows
//! from the table, drop their elements from the mirror, and publish the new
//! mirror on the path channel. Animated pops publish only once the transition
//! finishes, and not at all if it is cancelled.
//!
//! # Invariants
//!
//! 1. When settled, the table's values are exactly `0..path.len()`.
//! 2. Reconciler-driven replacements are never published: the state is
//!    [`ReconcileState::Reconciling`] for the duration of the host call and
//!    publication is skipped while it is.
//! 3. A publication happens only when the mirror actually changed.

use std::fmt;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, warn};

use crate::config::NavigationConfig;
use crate::error::NavigationError;
use crate::host::{
    HostContainer, PopResult, ScreenStack, StackEntry, TransitionOutcome, TransitionToken,
};
use crate::identity::{IdentityKey, PathElement, erase, key_for};
use crate::registry::DestinationRegistry;
use crate::screen::{Screen, ScreenId, ScreenOrigin, ScreenView};

/// Reconciler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// Path mirror and physical stack agree.
    Settled,
    /// A structural replacement of the host stack is in progress.
    Reconciling,
    /// Mapped screens are being refreshed in place.
    UpdatingContent,
}

/// What a reconcile did to the physical stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Whether the host stack was replaced.
    pub structural: bool,
    /// Screens kept and refreshed in place, in path order.
    pub reused: Vec<ScreenId>,
    /// Screens newly built, in path order.
    pub mounted: Vec<ScreenId>,
    /// Screens that left the stack.
    pub removed: Vec<ScreenId>,
    /// Keys that had no registered destination.
    pub unresolved: Vec<IdentityKey>,
}

/// Screens removed by a pop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopOutcome {
    /// Departing screens, topmost first.
    pub removed: Vec<ScreenId>,
    /// Set while the pop is animating; pass it to
    /// [`StackReconciler::finish_transition`] when the animation ends.
    pub transition: Option<TransitionToken>,
}

impl PopOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Stack access for components that push screens outside the path.
pub trait StackNavigator<V> {
    fn top_screen(&self) -> Option<ScreenId>;

    /// Ids bottom to top.
    fn screen_ids(&self) -> Vec<ScreenId>;

    fn contains_screen(&self, id: ScreenId) -> bool {
        self.screen_ids().contains(&id)
    }

    fn destinations(&self) -> &DestinationRegistry<V>;

    fn push_screen(&mut self, screen: Screen<V>, animated: bool);

    fn replace_stack(
        &mut self,
        entries: Vec<StackEntry<V>>,
        animated: bool,
    ) -> Result<Vec<ScreenId>, NavigationError>;

    fn pop_to_screen(
        &mut self,
        target: ScreenId,
        animated: bool,
    ) -> Result<PopOutcome, NavigationError>;

    /// Swap a screen's content in place. Returns false if it is not present.
    fn refresh_screen(&mut self, id: ScreenId, content: V) -> bool;
}

type TeardownObserver = Rc<dyn Fn(ScreenId)>;

/// Keeps a host stack and a path mirror consistent in both directions.
pub struct StackReconciler<D, V, H> {
    host: H,
    registry: DestinationRegistry<V>,
    config: NavigationConfig,
    root: ScreenId,
    path: Vec<D>,
    table: FxHashMap<ScreenId, usize>,
    state: ReconcileState,
    sender: Sender<Vec<D>>,
    receiver: Option<Receiver<Vec<D>>>,
    pending_pops: FxHashMap<TransitionToken, Vec<ScreenId>>,
    on_teardown: Option<TeardownObserver>,
}

impl<D, V> StackReconciler<D, V, ScreenStack<V>>
where
    D: PathElement,
    V: ScreenView,
{
    /// Reconciler over an in-memory [`ScreenStack`] rooted at `root`.
    #[must_use]
    pub fn with_root(root: V, registry: DestinationRegistry<V>, config: NavigationConfig) -> Self {
        let stack = ScreenStack::new(Screen::root(root, registry.clone()));
        Self::build(stack, registry, config)
    }

    /// Like [`Self::with_root`], with the path receiver already taken.
    pub(crate) fn with_root_detached(
        root: V,
        registry: DestinationRegistry<V>,
        config: NavigationConfig,
    ) -> (Self, Receiver<Vec<D>>) {
        let stack = ScreenStack::new(Screen::root(root, registry.clone()));
        let (mut reconciler, receiver) = Self::build_parts(stack, registry, config);
        reconciler.receiver = None;
        (reconciler, receiver)
    }
}

impl<D, V, H> StackReconciler<D, V, H>
where
    D: PathElement,
    V: ScreenView,
    H: HostContainer<V>,
{
    /// Reconciler over `host`, whose first screen becomes the permanent root.
    pub fn new(
        host: H,
        registry: DestinationRegistry<V>,
        config: NavigationConfig,
    ) -> Result<Self, NavigationError> {
        if host.screens().is_empty() {
            return Err(NavigationError::MissingRoot);
        }
        Ok(Self::build(host, registry, config))
    }

    fn build(host: H, registry: DestinationRegistry<V>, config: NavigationConfig) -> Self {
        let (mut reconciler, receiver) = Self::build_parts(host, registry, config);
        reconciler.receiver = Some(receiver);
        reconciler
    }

    fn build_parts(
        host: H,
        registry: DestinationRegistry<V>,
        config: NavigationConfig,
    ) -> (Self, Receiver<Vec<D>>) {
        let root = host.screens()[0].id();
        let (sender, receiver) = mpsc::channel();
        let reconciler = Self {
            host,
            registry,
            config,
            root,
            path: Vec::new(),
            table: FxHashMap::default(),
            state: ReconcileState::Settled,
            sender,
            receiver: None,
            pending_pops: FxHashMap::default(),
            on_teardown: None,
        };
        (reconciler, receiver)
    }

    // -- Accessors --

    /// Path mirror.
    #[must_use]
    pub fn path(&self) -> &[D] {
        &self.path
    }

    #[must_use]
    pub fn state(&self) -> ReconcileState {
        self.state
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn registry(&self) -> &DestinationRegistry<V> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    #[must_use]
    pub fn root_id(&self) -> ScreenId {
        self.root
    }

    /// Path index of a physical screen, if it is mapped.
    #[must_use]
    pub fn index_of(&self, id: ScreenId) -> Option<usize> {
        self.table.get(&id).copied()
    }

    /// Correspondence table rows, sorted by path index.
    #[must_use]
    pub fn correspondence(&self) -> Vec<(ScreenId, usize)> {
        let mut rows: Vec<_> = self.table.iter().map(|(id, index)| (*id, *index)).collect();
        rows.sort_by_key(|(_, index)| *index);
        rows
    }

    /// Mapped screens, bottom to top.
    #[must_use]
    pub fn path_screens(&self) -> Vec<ScreenId> {
        self.host
            .screens()
            .iter()
            .map(Screen::id)
            .filter(|id| self.table.contains_key(id))
            .collect()
    }

    /// Hand out the receiving end of the path channel.
    ///
    /// There is one consumer per reconciler. The channel closes when the
    /// reconciler is dropped.
    pub fn take_receiver(&mut self) -> Result<Receiver<Vec<D>>, NavigationError> {
        self.receiver.take().ok_or(NavigationError::ReceiverTaken)
    }

    /// Call `observer` whenever a path screen built by this reconciler is
    /// torn down. Content refreshes never trigger it.
    pub fn on_teardown(&mut self, observer: impl Fn(ScreenId) + 'static) {
        self.on_teardown = Some(Rc::new(observer));
    }

    // -- Path to stack --

    /// Refresh the root screen's content in place.
    pub fn update_root(&mut self, content: V) {
        if let Some(root) = self.host.screen_mut(self.root) {
            root.refresh(content);
        }
    }

    /// Make the physical stack match `path`.
    pub fn set_desired_path(&mut self, path: Vec<D>) -> ReconcileReport {
        if path.len() == self.path.len() {
            self.refresh_content(path)
        } else {
            self.reconcile_structural(path)
        }
    }

    fn resolve(
        &self,
        element: &D,
        index: usize,
        report: &mut ReconcileReport,
    ) -> (ScreenOrigin, V) {
        let key = key_for(element);
        match self.registry.resolve(&key, erase(element)) {
            Some(view) => (ScreenOrigin::Destination(key), view),
            None => {
                warn!(
                    key = %key,
                    index,
                    "no navigation destination registered for {key}; showing placeholder"
                );
                report.unresolved.push(key);
                (ScreenOrigin::Unresolved(key), V::placeholder(&key))
            }
        }
    }

    fn origin_of(&self, id: ScreenId) -> Option<ScreenOrigin> {
        self.host
            .screens()
            .iter()
            .find(|screen| screen.id() == id)
            .map(Screen::origin)
    }

    fn reusable(&self, slot: Option<ScreenId>, origin: ScreenOrigin) -> Option<ScreenId> {
        let id = slot?;
        if matches!(origin, ScreenOrigin::Unresolved(_)) && !self.config.reuse_placeholders {
            return None;
        }
        (self.origin_of(id)? == origin).then_some(id)
    }

    fn new_screen(&self, origin: ScreenOrigin, content: V) -> Screen<V> {
        let screen = Screen::new(origin, content, self.registry.clone());
        let id = screen.id();
        let observer = self.on_teardown.clone();
        screen.with_on_remove(move || {
            debug!(screen = %id, "path screen torn down");
            if let Some(observer) = observer {
                observer(id);
            }
        })
    }

    fn reconcile_structural(&mut self, path: Vec<D>) -> ReconcileReport {
        let _span = debug_span!("reconcile", from = self.path.len(), to = path.len()).entered();
        let mut report = ReconcileReport {
            structural: true,
            ..ReconcileReport::default()
        };

        // Departing screens must not come back on a later cancel.
        let mut settled = Vec::new();
        for (token, _) in std::mem::take(&mut self.pending_pops) {
            if let Some(screens) = self.host.finish_transition(token, TransitionOutcome::Finished) {
                debug!(token = %token, "pending pop settled by reconcile");
                settled.extend(screens);
            }
        }

        let mut current: Vec<Option<ScreenId>> = vec![None; self.path.len()];
        for (id, index) in &self.table {
            if let Some(slot) = current.get_mut(*index) {
                *slot = Some(*id);
            }
        }

        let mut entries = Vec::with_capacity(path.len() + 1);
        entries.push(StackEntry::Existing(self.root));
        let mut table = FxHashMap::default();
        for (index, element) in path.iter().enumerate() {
            let (origin, content) = self.resolve(element, index, &mut report);
            let slot = current.get(index).copied().flatten();
            let id = match self.reusable(slot, origin) {
                Some(id) => {
                    if let Some(screen) = self.host.screen_mut(id) {
                        screen.refresh(content);
                    }
                    report.reused.push(id);
                    entries.push(StackEntry::Existing(id));
                    id
                }
                None => {
                    let screen = self.new_screen(origin, content);
                    let id = screen.id();
                    report.mounted.push(id);
                    entries.push(StackEntry::New(screen));
                    id
                }
            };
            table.insert(id, index);
        }

        self.state = ReconcileState::Reconciling;
        let removed = self
            .host
            .replace_screens(entries, self.config.animate_structural);
        self.table = table;
        self.path = path;
        self.state = ReconcileState::Settled;

        report.removed = settled.iter().chain(&removed).map(Screen::id).collect();
        debug!(
            reused = report.reused.len(),
            mounted = report.mounted.len(),
            removed = report.removed.len(),
            "structural reconcile applied"
        );
        debug_assert!(self.table_is_dense());
        drop(settled);
        drop(removed);
        report
    }

    fn refresh_content(&mut self, path: Vec<D>) -> ReconcileReport {
        self.state = ReconcileState::UpdatingContent;
        let mut report = ReconcileReport::default();
        for (id, index) in self.correspondence() {
            let Some(element) = path.get(index) else {
                continue;
            };
            let (origin, content) = self.resolve(element, index, &mut report);
            if let Some(screen) = self.host.screen_mut(id) {
                screen.refresh_from(origin, content);
                report.reused.push(id);
            }
        }
        self.path = path;
        self.state = ReconcileState::Settled;
        debug!(refreshed = report.reused.len(), "content-only refresh applied");
        report
    }

    // -- Stack to path --

    /// Pop the top screen.
    pub fn pop(&mut self, animated: bool) -> PopOutcome {
        let result = self.host.pop(animated);
        self.apply_pop(result)
    }

    /// Pop every screen above `target`.
    pub fn pop_to(
        &mut self,
        target: ScreenId,
        animated: bool,
    ) -> Result<PopOutcome, NavigationError> {
        if !self.host.contains(target) {
            return Err(NavigationError::ScreenNotInStack(target));
        }
        let result = self.host.pop_to(target, animated);
        Ok(self.apply_pop(result))
    }

    /// Pop every screen above the root.
    pub fn pop_to_root(&mut self, animated: bool) -> PopOutcome {
        let result = self.host.pop_to_root(animated);
        self.apply_pop(result)
    }

    /// Settle a pop transition started by one of the pop methods.
    pub fn finish_transition(
        &mut self,
        token: TransitionToken,
        outcome: TransitionOutcome,
    ) -> Result<(), NavigationError> {
        let ids = self
            .pending_pops
            .remove(&token)
            .ok_or(NavigationError::UnknownTransition(token))?;
        let removed = self
            .host
            .finish_transition(token, outcome)
            .ok_or(NavigationError::UnknownTransition(token))?;
        match outcome {
            TransitionOutcome::Finished => self.settle_removal(&ids),
            TransitionOutcome::Cancelled => {
                debug!(token = %token, "pop cancelled; path unchanged");
            }
        }
        drop(removed);
        Ok(())
    }

    /// Replace the stack wholesale from outside the path.
    ///
    /// The mirror is rebuilt from the mapped screens that survive, in their
    /// new order. Unmapped screens are kept but stay out of the path.
    pub fn set_screens(
        &mut self,
        entries: Vec<StackEntry<V>>,
        animated: bool,
    ) -> Result<Vec<ScreenId>, NavigationError> {
        if entries.first().map(StackEntry::id) != Some(self.root) {
            return Err(NavigationError::MissingRoot);
        }
        let removed = self.host.replace_screens(entries, animated);

        let mut path = Vec::with_capacity(self.path.len());
        let mut table = FxHashMap::default();
        for screen in self.host.screens().iter().skip(1) {
            let Some(old) = self.table.get(&screen.id()).copied() else {
                continue;
            };
            if let Some(element) = self.path.get(old) {
                table.insert(screen.id(), path.len());
                path.push(element.clone());
            }
        }
        let changed = path != self.path;
        self.table = table;
        self.path = path;
        if changed {
            self.publish();
        }

        let ids = removed.iter().map(Screen::id).collect();
        drop(removed);
        Ok(ids)
    }

    /// Push a screen that does not belong to the path.
    pub fn push_screen(&mut self, screen: Screen<V>, animated: bool) {
        self.host.push(screen, animated);
    }

    fn apply_pop(&mut self, result: Option<PopResult<V>>) -> PopOutcome {
        match result {
            None => PopOutcome::default(),
            Some(PopResult::Completed(screens)) => {
                let removed: Vec<ScreenId> = screens.iter().map(Screen::id).collect();
                self.settle_removal(&removed);
                drop(screens);
                PopOutcome {
                    removed,
                    transition: None,
                }
            }
            Some(PopResult::Pending { token, ids }) => {
                self.pending_pops.insert(token, ids.clone());
                PopOutcome {
                    removed: ids,
                    transition: Some(token),
                }
            }
        }
    }

    fn settle_removal(&mut self, removed: &[ScreenId]) {
        if self.forget(removed) {
            self.publish();
        }
    }

    /// Drop table rows and mirror elements for `removed`, then re-index the
    /// survivors. Returns whether the mirror changed.
    fn forget(&mut self, removed: &[ScreenId]) -> bool {
        let mut indices: Vec<usize> = removed
            .iter()
            .filter_map(|id| self.table.remove(id))
            .filter(|index| *index < self.path.len())
            .collect();
        if indices.is_empty() {
            return false;
        }
        indices.sort_unstable();
        indices.dedup();
        for index in indices.iter().rev() {
            self.path.remove(*index);
        }
        for index in self.table.values_mut() {
            let old = *index;
            *index -= indices.partition_point(|gone| *gone < old);
        }
        true
    }

    fn publish(&mut self) {
        if self.state == ReconcileState::Reconciling {
            debug!("path publication suppressed during reconcile");
            return;
        }
        debug!(len = self.path.len(), "publishing host-driven path");
        if self.sender.send(self.path.clone()).is_err() {
            debug!("path receiver dropped; publication discarded");
        }
    }

    fn table_is_dense(&self) -> bool {
        let mut seen = vec![false; self.path.len()];
        for index in self.table.values() {
            match seen.get_mut(*index) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|s| s)
    }
}

impl<D, V, H> StackNavigator<V> for StackReconciler<D, V, H>
where
    D: PathElement,
    V: ScreenView,
    H: HostContainer<V>,
{
    fn top_screen(&self) -> Option<ScreenId> {
        self.host.top()
    }

    fn screen_ids(&self) -> Vec<ScreenId> {
        self.host.screens().iter().map(Screen::id).collect()
    }

    fn contains_screen(&self, id: ScreenId) -> bool {
        self.host.contains(id)
    }

    fn destinations(&self) -> &DestinationRegistry<V> {
        &self.registry
    }

    fn push_screen(&mut self, screen: Screen<V>, animated: bool) {
        StackReconciler::push_screen(self, screen, animated);
    }

    fn replace_stack(
        &mut self,
        entries: Vec<StackEntry<V>>,
        animated: bool,
    ) -> Result<Vec<ScreenId>, NavigationError> {
        self.set_screens(entries, animated)
    }

    fn pop_to_screen(
        &mut self,
        target: ScreenId,
        animated: bool,
    ) -> Result<PopOutcome, NavigationError> {
        self.pop_to(target, animated)
    }

    fn refresh_screen(&mut self, id: ScreenId, content: V) -> bool {
        match self.host.screen_mut(id) {
            Some(screen) => {
                screen.refresh(content);
                true
            }
            None => false,
        }
    }
}

impl<D: fmt::Debug, V, H> fmt::Debug for StackReconciler<D, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackReconciler")
            .field("root", &self.root)
            .field("path", &self.path)
            .field("table", &self.table)
            .field("state", &self.state)
            .field("pending_pops", &self.pending_pops.len())
            .finish_non_exhaustive()
    }
}
