#![forbid(unsafe_code)]

//! Path-driven navigation stack.
//!
//! [`NavigationStack`] ties an application-owned [`Binding`] of the path to a
//! [`StackReconciler`]. The application calls [`NavigationStack::update`]
//! whenever it re-renders and [`NavigationStack::tick`] from its event loop:
//!
//! ```text
//! binding write ──► UpdateQueue ──► reconciler ──► host stack
//!                                                     │ pop / swipe back
//! binding ◄── pump ◄── path channel ◄─────────────────┘
//! ```
//!
//! Host-driven changes win over a pending debounced update: the pump drops
//! it before writing the host's path back to the binding.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::binding::Binding;
use crate::config::NavigationConfig;
use crate::error::NavigationError;
use crate::host::{HostContainer, ScreenStack, TransitionOutcome, TransitionToken};
use crate::identity::PathElement;
use crate::reconciler::{PopOutcome, ReconcileReport, StackReconciler};
use crate::registry::DestinationRegistry;
use crate::screen::{ScreenId, ScreenView};
use crate::update_queue::{UpdateAction, UpdateQueue};

/// Navigation stack driven by a path binding.
pub struct NavigationStack<D, V, H = ScreenStack<V>> {
    path: Binding<Vec<D>>,
    seen_version: u64,
    reconciler: StackReconciler<D, V, H>,
    receiver: Receiver<Vec<D>>,
    queue: UpdateQueue<D>,
}

impl<D, V> NavigationStack<D, V, ScreenStack<V>>
where
    D: PathElement,
    V: ScreenView,
{
    /// Stack over an in-memory host rooted at `root`.
    ///
    /// The binding's current path is applied immediately.
    #[must_use]
    pub fn new(
        path: Binding<Vec<D>>,
        root: V,
        registry: DestinationRegistry<V>,
        config: NavigationConfig,
    ) -> Self {
        let (reconciler, receiver) = StackReconciler::with_root_detached(root, registry, config);
        Self::assemble(path, reconciler, receiver)
    }
}

impl<D, V, H> NavigationStack<D, V, H>
where
    D: PathElement,
    V: ScreenView,
    H: HostContainer<V>,
{
    /// Stack over an existing reconciler.
    ///
    /// Fails if the reconciler's path receiver was already taken.
    pub fn from_reconciler(
        path: Binding<Vec<D>>,
        mut reconciler: StackReconciler<D, V, H>,
    ) -> Result<Self, NavigationError> {
        let receiver = reconciler.take_receiver()?;
        Ok(Self::assemble(path, reconciler, receiver))
    }

    fn assemble(
        path: Binding<Vec<D>>,
        mut reconciler: StackReconciler<D, V, H>,
        receiver: Receiver<Vec<D>>,
    ) -> Self {
        reconciler.set_desired_path(path.get());
        let queue = UpdateQueue::new(reconciler.config().debounce);
        Self {
            seen_version: path.version(),
            path,
            reconciler,
            receiver,
            queue,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Binding<Vec<D>> {
        &self.path
    }

    #[must_use]
    pub fn reconciler(&self) -> &StackReconciler<D, V, H> {
        &self.reconciler
    }

    /// Mutable access for local destinations and host-side pops.
    ///
    /// Changes made through it reach the binding on the next pump.
    pub fn reconciler_mut(&mut self) -> &mut StackReconciler<D, V, H> {
        &mut self.reconciler
    }

    #[must_use]
    pub fn registry(&self) -> &DestinationRegistry<V> {
        self.reconciler.registry()
    }

    /// Re-render with the current wall clock.
    pub fn update(&mut self, root: Option<V>) -> Option<ReconcileReport> {
        self.update_at(Instant::now(), root)
    }

    /// Re-render: refresh the root, then route a changed path binding.
    ///
    /// Returns the report of an update applied right away. Count-changing
    /// updates are deferred to [`Self::tick_at`] unless the debounce is zero.
    pub fn update_at(&mut self, now: Instant, root: Option<V>) -> Option<ReconcileReport> {
        self.pump();
        if let Some(root) = root {
            self.reconciler.update_root(root);
        }
        let version = self.path.version();
        if version == self.seen_version {
            return None;
        }
        self.seen_version = version;
        let current_len = self.reconciler.path().len();
        match self.queue.send_at(self.path.get(), current_len, now) {
            UpdateAction::Content(path) | UpdateAction::Structural(path) => {
                Some(self.reconciler.set_desired_path(path))
            }
            UpdateAction::Deferred => None,
        }
    }

    pub fn tick(&mut self) -> Option<ReconcileReport> {
        self.tick_at(Instant::now())
    }

    /// Drain host-driven changes, then apply a debounced update whose quiet
    /// period has elapsed.
    pub fn tick_at(&mut self, now: Instant) -> Option<ReconcileReport> {
        self.pump();
        let path = self.queue.flush_at(now)?;
        debug!(len = path.len(), "applying debounced path update");
        Some(self.reconciler.set_desired_path(path))
    }

    /// Time until the pending update is applied, if one is pending.
    #[must_use]
    pub fn time_until_flush(&self, now: Instant) -> Option<Duration> {
        self.queue.time_until_flush(now)
    }

    #[must_use]
    pub fn has_pending_update(&self) -> bool {
        self.queue.has_pending()
    }

    /// Write host-driven path changes back to the binding.
    ///
    /// Returns how many were received. Any pending debounced update is
    /// dropped when at least one arrives. A binding write not yet routed
    /// wins over host-driven paths: they are drained but not written back.
    pub fn pump(&mut self) -> usize {
        let mut received = 0;
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(path) => {
                    received += 1;
                    latest = Some(path);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if latest.is_some() && self.path.version() != self.seen_version {
            debug!("host-driven path discarded; binding has a newer write");
            return received;
        }
        if let Some(path) = latest {
            if self.queue.cancel() {
                debug!("pending path update dropped by host-driven change");
            }
            self.path.set(path);
            self.seen_version = self.path.version();
        }
        received
    }

    /// Pop the top screen and write the result back.
    pub fn pop(&mut self) -> PopOutcome {
        let animated = self.reconciler.config().animate_pops;
        let outcome = self.reconciler.pop(animated);
        self.pump();
        outcome
    }

    pub fn pop_to(&mut self, target: ScreenId) -> Result<PopOutcome, NavigationError> {
        let animated = self.reconciler.config().animate_pops;
        let outcome = self.reconciler.pop_to(target, animated)?;
        self.pump();
        Ok(outcome)
    }

    pub fn pop_to_root(&mut self) -> PopOutcome {
        let animated = self.reconciler.config().animate_pops;
        let outcome = self.reconciler.pop_to_root(animated);
        self.pump();
        outcome
    }

    /// Settle an animated pop and write the result back.
    pub fn finish_transition(
        &mut self,
        token: TransitionToken,
        outcome: TransitionOutcome,
    ) -> Result<(), NavigationError> {
        self.reconciler.finish_transition(token, outcome)?;
        self.pump();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    fn registry() -> DestinationRegistry<String> {
        let registry = DestinationRegistry::new();
        registry.register(|n: &u32| format!("item {n}"));
        registry
    }

    fn stack(initial: Vec<u32>, debounce: Duration) -> NavigationStack<u32, String> {
        let config = NavigationConfig::immediate().with_debounce(debounce);
        NavigationStack::new(Binding::new(initial), "root".into(), registry(), config)
    }

    fn contents(stack: &NavigationStack<u32, String>) -> Vec<String> {
        stack
            .reconciler()
            .host()
            .screens()
            .iter()
            .map(|s| s.content().clone())
            .collect()
    }

    #[test]
    fn initial_path_is_applied_immediately() {
        let s = stack(vec![1, 2], WINDOW);
        assert_eq!(contents(&s), ["root", "item 1", "item 2"]);
        assert!(!s.has_pending_update());
    }

    #[test]
    fn burst_applies_only_latest_after_quiet_period() {
        let mut s = stack(vec![], WINDOW);
        let now = Instant::now();
        let binding = s.path().clone();

        binding.set(vec![1]);
        assert!(s.update_at(now, None).is_none());
        binding.set(vec![1, 2]);
        assert!(s.update_at(now + Duration::from_millis(40), None).is_none());
        binding.set(vec![1, 2, 3]);
        assert!(s.update_at(now + Duration::from_millis(80), None).is_none());

        assert!(s.tick_at(now + Duration::from_millis(150)).is_none());
        assert_eq!(contents(&s), ["root"]);

        let report = s.tick_at(now + Duration::from_millis(180)).unwrap();
        assert_eq!(report.mounted.len(), 3);
        assert_eq!(contents(&s), ["root", "item 1", "item 2", "item 3"]);
    }

    #[test]
    fn same_length_update_applies_immediately_and_supersedes_pending() {
        let mut s = stack(vec![1], WINDOW);
        let now = Instant::now();
        let binding = s.path().clone();

        binding.set(vec![1, 2]);
        s.update_at(now, None);
        assert!(s.has_pending_update());

        binding.set(vec![5]);
        let report = s.update_at(now + Duration::from_millis(10), None).unwrap();
        assert!(!report.structural);
        assert!(!s.has_pending_update());
        assert_eq!(contents(&s), ["root", "item 5"]);
        assert!(s.tick_at(now + WINDOW * 3).is_none());
    }

    #[test]
    fn unchanged_binding_does_nothing() {
        let mut s = stack(vec![1], Duration::ZERO);
        assert!(s.update(None).is_none());
        s.path().set(vec![1]);
        assert!(s.update(None).is_none());
    }

    #[test]
    fn zero_debounce_applies_structural_update_in_update() {
        let mut s = stack(vec![], Duration::ZERO);
        s.path().set(vec![4, 5]);
        let report = s.update(None).unwrap();
        assert!(report.structural);
        assert_eq!(contents(&s), ["root", "item 4", "item 5"]);
    }

    #[test]
    fn pop_writes_back_without_echo() {
        let mut s = stack(vec![1, 2], Duration::ZERO);
        let version = s.path().version();
        let outcome = s.pop();
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(s.path().get(), vec![1]);
        assert_eq!(s.path().version(), version + 1);
        assert!(s.update(None).is_none());
        assert_eq!(contents(&s), ["root", "item 1"]);
    }

    #[test]
    fn host_pop_drops_pending_update() {
        let mut s = stack(vec![1, 2], WINDOW);
        let now = Instant::now();
        s.path().set(vec![1, 2, 3]);
        s.update_at(now, None);
        assert!(s.has_pending_update());

        s.pop_to_root();
        assert!(!s.has_pending_update());
        assert!(s.path().get().is_empty());
        assert!(s.tick_at(now + WINDOW * 2).is_none());
        assert_eq!(contents(&s), ["root"]);
    }

    #[test]
    fn reconciler_side_pop_reaches_binding_on_next_update() {
        let mut s = stack(vec![1, 2, 3], Duration::ZERO);
        let target = s.reconciler().path_screens()[0];
        s.reconciler_mut().pop_to(target, false).unwrap();
        assert_eq!(s.path().get(), vec![1, 2, 3]);
        s.update(None);
        assert_eq!(s.path().get(), vec![1]);
    }

    #[test]
    fn newer_binding_write_wins_over_host_pop() {
        let mut s = stack(vec![1, 2], Duration::ZERO);
        s.reconciler_mut().pop(false);
        s.path().set(vec![7, 8, 9]);

        let report = s.update(None).unwrap();
        assert!(report.structural);
        assert_eq!(s.path().get(), vec![7, 8, 9]);
        assert_eq!(s.reconciler().path(), [7, 8, 9]);
        assert_eq!(contents(&s), ["root", "item 7", "item 8", "item 9"]);
        assert!(s.update(None).is_none());
    }

    #[test]
    fn update_refreshes_root() {
        let mut s = stack(vec![], Duration::ZERO);
        s.update(Some("home".into()));
        assert_eq!(contents(&s), ["home"]);
    }

    #[test]
    fn time_until_flush_counts_down() {
        let mut s = stack(vec![], WINDOW);
        let now = Instant::now();
        assert!(s.time_until_flush(now).is_none());
        s.path().set(vec![1]);
        s.update_at(now, None);
        assert_eq!(
            s.time_until_flush(now + Duration::from_millis(25)),
            Some(Duration::from_millis(75))
        );
    }

    #[test]
    fn from_reconciler_requires_receiver() {
        let mut reconciler: StackReconciler<u32, String, ScreenStack<String>> =
            StackReconciler::with_root("root".into(), registry(), NavigationConfig::immediate());
        let _rx = reconciler.take_receiver().unwrap();
        assert!(matches!(
            NavigationStack::from_reconciler(Binding::new(vec![]), reconciler),
            Err(NavigationError::ReceiverTaken)
        ));
    }
}
