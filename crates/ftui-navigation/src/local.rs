#![forbid(unsafe_code)]

//! Destinations presented by a boolean gate instead of the path.
//!
//! A [`LocalDestination`] pushes one child screen directly above the screen
//! it appeared in (its anchor) while its gate is true, and pops back to the
//! anchor when the gate turns false. When the child leaves the stack any
//! other way (back button, swipe, a reconcile that drops it) its removal
//! hook writes `false` to the gate.
//!
//! The destination holds only the child's [`ScreenId`]. If the child is no
//! longer in the stack at the next update, the slot is cleared.

use tracing::{debug, warn};

use crate::binding::Binding;
use crate::error::NavigationError;
use crate::host::StackEntry;
use crate::reconciler::{PopOutcome, StackNavigator};
use crate::screen::{Screen, ScreenId, ScreenView};

/// What an update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalChange {
    /// Nothing to do.
    Idle,
    /// The child was pushed.
    Pushed(ScreenId),
    /// The presented child's content was refreshed in place.
    Refreshed(ScreenId),
    /// The child was dismissed.
    Dismissed(Vec<ScreenId>),
}

/// One gate-driven child screen.
#[derive(Debug)]
pub struct LocalDestination {
    presented: Binding<bool>,
    anchor: Option<ScreenId>,
    child: Option<ScreenId>,
    animated: bool,
}

impl LocalDestination {
    #[must_use]
    pub fn new(presented: Binding<bool>) -> Self {
        Self {
            presented,
            anchor: None,
            child: None,
            animated: true,
        }
    }

    #[must_use]
    pub fn with_animation(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    /// Record the screen this destination appeared in.
    pub fn appear(&mut self, anchor: ScreenId) {
        self.anchor = Some(anchor);
    }

    #[must_use]
    pub fn anchor(&self) -> Option<ScreenId> {
        self.anchor
    }

    /// The presented child, if it is still believed to be in the stack.
    #[must_use]
    pub fn child(&self) -> Option<ScreenId> {
        self.child
    }

    #[must_use]
    pub fn presented(&self) -> &Binding<bool> {
        &self.presented
    }

    /// Bring the stack in line with the gate.
    ///
    /// `content` is called only when the child is pushed or refreshed.
    pub fn update<V, N>(
        &mut self,
        nav: &mut N,
        content: impl FnOnce() -> V,
    ) -> Result<LocalChange, NavigationError>
    where
        V: ScreenView,
        N: StackNavigator<V>,
    {
        if let Some(child) = self.child.filter(|child| !nav.contains_screen(*child)) {
            debug!(screen = %child, "local destination child left the stack");
            self.child = None;
        }

        match (self.presented.get(), self.child) {
            (true, None) => self.present(nav, content()),
            (true, Some(child)) => {
                nav.refresh_screen(child, content());
                Ok(LocalChange::Refreshed(child))
            }
            (false, Some(child)) => self.dismiss(nav, child),
            (false, None) => Ok(LocalChange::Idle),
        }
    }

    fn present<V, N>(&mut self, nav: &mut N, content: V) -> Result<LocalChange, NavigationError>
    where
        V: ScreenView,
        N: StackNavigator<V>,
    {
        let Some(anchor) = self.anchor else {
            warn!("local destination presented before it appeared; ignoring");
            return Ok(LocalChange::Idle);
        };
        if !nav.contains_screen(anchor) {
            return Err(NavigationError::ScreenNotInStack(anchor));
        }
        let gate = self.presented.clone();
        let screen = Screen::foreign(content, nav.destinations().clone()).with_on_remove(move || {
            gate.set(false);
        });
        let id = screen.id();
        if nav.top_screen() == Some(anchor) {
            nav.push_screen(screen, self.animated);
        } else {
            // Screens above the anchor leave; the path is truncated with them.
            let mut entries: Vec<StackEntry<V>> = nav
                .screen_ids()
                .into_iter()
                .take_while(|existing| *existing != anchor)
                .map(StackEntry::Existing)
                .collect();
            entries.push(StackEntry::Existing(anchor));
            entries.push(StackEntry::New(screen));
            nav.replace_stack(entries, self.animated)?;
        }
        self.child = Some(id);
        debug!(screen = %id, anchor = %anchor, "local destination pushed");
        Ok(LocalChange::Pushed(id))
    }

    fn dismiss<V, N>(
        &mut self,
        nav: &mut N,
        child: ScreenId,
    ) -> Result<LocalChange, NavigationError>
    where
        V: ScreenView,
        N: StackNavigator<V>,
    {
        self.child = None;
        let removed = match self.anchor.filter(|anchor| nav.contains_screen(*anchor)) {
            Some(anchor) => {
                let PopOutcome { removed, .. } = nav.pop_to_screen(anchor, self.animated)?;
                removed
            }
            None => {
                let entries = nav
                    .screen_ids()
                    .into_iter()
                    .filter(|id| *id != child)
                    .map(StackEntry::Existing)
                    .collect();
                nav.replace_stack(entries, self.animated)?
            }
        };
        debug!(screen = %child, removed = removed.len(), "local destination dismissed");
        Ok(LocalChange::Dismissed(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavigationConfig;
    use crate::host::{HostContainer, ScreenStack};
    use crate::reconciler::StackReconciler;
    use crate::registry::DestinationRegistry;

    type Reconciler = StackReconciler<u32, String, ScreenStack<String>>;

    fn reconciler(path: Vec<u32>) -> Reconciler {
        let registry = DestinationRegistry::new();
        registry.register(|n: &u32| format!("item {n}"));
        let mut r =
            StackReconciler::with_root("root".into(), registry, NavigationConfig::immediate());
        r.set_desired_path(path);
        r
    }

    fn contents(r: &Reconciler) -> Vec<String> {
        r.host().screens().iter().map(|s| s.content().clone()).collect()
    }

    fn anchored(r: &Reconciler, gate: &Binding<bool>) -> LocalDestination {
        let mut local = LocalDestination::new(gate.clone()).with_animation(false);
        local.appear(r.host().top().unwrap());
        local
    }

    #[test]
    fn gate_true_pushes_child_on_anchor() {
        let mut r = reconciler(vec![1]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        let change = local.update(&mut r, || "detail".to_string()).unwrap();
        let LocalChange::Pushed(id) = change else {
            panic!("expected push, got {change:?}");
        };
        assert_eq!(local.child(), Some(id));
        assert_eq!(contents(&r), ["root", "item 1", "detail"]);
        assert_eq!(r.path(), [1]);
    }

    #[test]
    fn push_over_buried_anchor_drops_screens_above_it() {
        let mut r = reconciler(vec![1, 2]);
        let rx = r.take_receiver().unwrap();
        let gate = Binding::new(true);
        let mut local = LocalDestination::new(gate.clone()).with_animation(false);
        local.appear(r.path_screens()[0]);

        let change = local.update(&mut r, || "detail".to_string()).unwrap();
        assert!(matches!(change, LocalChange::Pushed(_)));
        assert_eq!(contents(&r), ["root", "item 1", "detail"]);
        assert_eq!(r.path(), [1]);
        assert_eq!(rx.try_recv(), Ok(vec![1]));
        assert!(gate.get());
    }

    #[test]
    fn presented_child_refreshes_in_place() {
        let mut r = reconciler(vec![]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        local.update(&mut r, || "v1".to_string()).unwrap();
        let id = local.child().unwrap();
        let change = local.update(&mut r, || "v2".to_string()).unwrap();
        assert_eq!(change, LocalChange::Refreshed(id));
        assert_eq!(contents(&r), ["root", "v2"]);
    }

    #[test]
    fn gate_false_pops_back_to_anchor() {
        let mut r = reconciler(vec![1]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        local.update(&mut r, || "detail".to_string()).unwrap();
        let id = local.child().unwrap();

        gate.set(false);
        let change = local.update(&mut r, String::new).unwrap();
        assert_eq!(change, LocalChange::Dismissed(vec![id]));
        assert_eq!(contents(&r), ["root", "item 1"]);
        assert_eq!(r.path(), [1]);
        assert!(!gate.get());
    }

    #[test]
    fn back_navigation_clears_gate() {
        let mut r = reconciler(vec![1]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        local.update(&mut r, || "detail".to_string()).unwrap();

        r.pop(false);
        assert!(!gate.get());
        assert_eq!(r.path(), [1]);
        let change = local.update(&mut r, String::new).unwrap();
        assert_eq!(change, LocalChange::Idle);
        assert!(local.child().is_none());
    }

    #[test]
    fn structural_reconcile_dropping_child_clears_gate() {
        let mut r = reconciler(vec![1]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        local.update(&mut r, || "detail".to_string()).unwrap();

        r.set_desired_path(vec![1, 2]);
        assert!(!gate.get());
        assert_eq!(local.update(&mut r, String::new).unwrap(), LocalChange::Idle);
    }

    #[test]
    fn presenting_before_appear_is_ignored() {
        let mut r = reconciler(vec![]);
        let mut local = LocalDestination::new(Binding::new(true));
        let change = local.update(&mut r, || "detail".to_string()).unwrap();
        assert_eq!(change, LocalChange::Idle);
        assert_eq!(contents(&r), ["root"]);
    }

    #[test]
    fn presenting_over_departed_anchor_is_error() {
        let mut r = reconciler(vec![1]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        let anchor = local.anchor().unwrap();
        r.pop(false);
        assert_eq!(
            local.update(&mut r, || "detail".to_string()),
            Err(NavigationError::ScreenNotInStack(anchor))
        );
    }

    #[test]
    fn dismiss_without_anchor_removes_only_child() {
        let mut r = reconciler(vec![1]);
        let gate = Binding::new(true);
        let mut local = anchored(&r, &gate);
        local.update(&mut r, || "detail".to_string()).unwrap();
        let child = local.child().unwrap();

        // Anchor gone, child still on top.
        let anchor = local.anchor().unwrap();
        let ids: Vec<_> = r
            .host()
            .screens()
            .iter()
            .map(Screen::id)
            .filter(|id| *id != anchor)
            .map(StackEntry::Existing)
            .collect();
        r.set_screens(ids, false).unwrap();
        assert!(r.host().contains(child));

        gate.set(false);
        let change = local.update(&mut r, String::new).unwrap();
        assert_eq!(change, LocalChange::Dismissed(vec![child]));
        assert_eq!(contents(&r), ["root"]);
    }
}
