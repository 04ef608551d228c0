#![forbid(unsafe_code)]

//! Physical screens and their teardown hooks.
//!
//! A [`Screen`] is one entry of the host stack: an identity, the content it
//! currently shows, where that content came from, and an optional
//! [`RemovalHook`]. Replacing the content with [`Screen::refresh`] keeps the
//! screen (and its hook) alive, so content updates never look like a
//! teardown to whoever listens for one.
//!
//! # Teardown
//!
//! The hook runs when the screen is dropped. The host stack is the only
//! owner of screens, so a drop happens exactly when the component that
//! removed the screen lets go of it: after a finished pop transition, or
//! when a reconcile leaves the screen out of the new stack.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::identity::IdentityKey;
use crate::registry::DestinationRegistry;

static NEXT_SCREEN_ID: AtomicU64 = AtomicU64::new(1);

/// Non-owning handle to a screen in a host stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(u64);

impl ScreenId {
    /// Allocate a process-unique id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_SCREEN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a screen's content was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOrigin {
    /// The permanent bottom screen.
    Root,
    /// Built by the registered destination for this key.
    Destination(IdentityKey),
    /// Placeholder for a key with no registered destination.
    Unresolved(IdentityKey),
    /// Pushed by something other than the path (e.g. a local destination).
    Foreign,
}

impl ScreenOrigin {
    /// Key this screen was resolved (or failed to resolve) from.
    #[must_use]
    pub fn key(&self) -> Option<IdentityKey> {
        match self {
            Self::Destination(key) | Self::Unresolved(key) => Some(*key),
            Self::Root | Self::Foreign => None,
        }
    }
}

/// Content types a host can show for an unresolved destination.
pub trait ScreenView: 'static {
    /// Visible error indicator for a path element whose key has no builder.
    fn placeholder(key: &IdentityKey) -> Self;
}

impl ScreenView for String {
    fn placeholder(key: &IdentityKey) -> Self {
        format!("\u{26a0}\u{fe0f} {key}")
    }
}

/// Callback run once when its owning screen is torn down.
pub struct RemovalHook {
    action: Option<Box<dyn FnOnce()>>,
}

impl RemovalHook {
    #[must_use]
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// Cancel the callback without running it.
    pub fn disarm(&mut self) {
        self.action = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.action.is_some()
    }
}

impl Drop for RemovalHook {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl fmt::Debug for RemovalHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemovalHook")
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// One physical entry of the host stack.
pub struct Screen<V> {
    id: ScreenId,
    origin: ScreenOrigin,
    content: V,
    registry: DestinationRegistry<V>,
    on_remove: Option<RemovalHook>,
}

impl<V> Screen<V> {
    /// Create a screen with a fresh id.
    ///
    /// `registry` is the destination registry visible to the content, so
    /// nested content can declare further destinations.
    #[must_use]
    pub fn new(origin: ScreenOrigin, content: V, registry: DestinationRegistry<V>) -> Self {
        Self {
            id: ScreenId::fresh(),
            origin,
            content,
            registry,
            on_remove: None,
        }
    }

    /// Root screen for a stack.
    #[must_use]
    pub fn root(content: V, registry: DestinationRegistry<V>) -> Self {
        Self::new(ScreenOrigin::Root, content, registry)
    }

    /// Screen that does not belong to the path.
    #[must_use]
    pub fn foreign(content: V, registry: DestinationRegistry<V>) -> Self {
        Self::new(ScreenOrigin::Foreign, content, registry)
    }

    /// Attach a teardown callback.
    #[must_use]
    pub fn with_on_remove(mut self, action: impl FnOnce() + 'static) -> Self {
        self.set_on_remove(RemovalHook::new(action));
        self
    }

    /// Replace the teardown callback. The previous one is disarmed, not run.
    pub fn set_on_remove(&mut self, hook: RemovalHook) {
        if let Some(mut old) = self.on_remove.replace(hook) {
            old.disarm();
        }
    }

    #[must_use]
    pub fn id(&self) -> ScreenId {
        self.id
    }

    #[must_use]
    pub fn origin(&self) -> ScreenOrigin {
        self.origin
    }

    #[must_use]
    pub fn content(&self) -> &V {
        &self.content
    }

    #[must_use]
    pub fn registry(&self) -> &DestinationRegistry<V> {
        &self.registry
    }

    /// Swap content in place. Identity and teardown hook are untouched.
    pub fn refresh(&mut self, content: V) {
        self.content = content;
    }

    /// Swap content and record a new origin.
    pub(crate) fn refresh_from(&mut self, origin: ScreenOrigin, content: V) {
        self.origin = origin;
        self.content = content;
    }
}

impl<V: fmt::Debug> fmt::Debug for Screen<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("content", &self.content)
            .field("on_remove", &self.on_remove)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn registry() -> DestinationRegistry<String> {
        DestinationRegistry::new()
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = ScreenId::fresh();
        let b = ScreenId::fresh();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn hook_runs_once_on_drop() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let screen = Screen::foreign("a".to_string(), registry()).with_on_remove(move || {
            c.set(c.get() + 1);
        });
        assert_eq!(count.get(), 0);
        drop(screen);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn refresh_does_not_run_hook() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let mut screen = Screen::foreign("a".to_string(), registry()).with_on_remove(move || {
            c.set(c.get() + 1);
        });
        let id = screen.id();
        screen.refresh("b".to_string());
        assert_eq!(screen.content(), "b");
        assert_eq!(screen.id(), id);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn replacing_hook_disarms_previous() {
        let first = Rc::new(Cell::new(false));
        let second = Rc::new(Cell::new(false));
        let (f, s) = (Rc::clone(&first), Rc::clone(&second));
        let mut screen =
            Screen::foreign(String::new(), registry()).with_on_remove(move || f.set(true));
        screen.set_on_remove(RemovalHook::new(move || s.set(true)));
        assert!(!first.get());
        drop(screen);
        assert!(!first.get());
        assert!(second.get());
    }

    #[test]
    fn disarmed_hook_is_silent() {
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        let mut hook = RemovalHook::new(move || f.set(true));
        hook.disarm();
        assert!(!hook.is_armed());
        drop(hook);
        assert!(!fired.get());
    }

    #[test]
    fn placeholder_names_key() {
        let key = IdentityKey::of::<u32>();
        let view = String::placeholder(&key);
        assert!(view.contains("u32"));
    }

    #[test]
    fn origin_key() {
        let key = IdentityKey::of::<u8>();
        assert_eq!(ScreenOrigin::Destination(key).key(), Some(key));
        assert_eq!(ScreenOrigin::Unresolved(key).key(), Some(key));
        assert_eq!(ScreenOrigin::Root.key(), None);
        assert_eq!(ScreenOrigin::Foreign.key(), None);
    }
}
