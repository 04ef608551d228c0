#![forbid(unsafe_code)]

//! Destination registry: identity key to erased screen builder.
//!
//! Content that declares a destination registers a builder for a path element
//! type while it is mounted and removes it when it unmounts. The reconciler
//! only reads the registry while resolving a path, so entries may come and go
//! freely between reconciles.
//!
//! The registry is a cheap, cloneable handle to shared single-threaded
//! storage. Every screen carries a clone so nested content can declare
//! destinations of its own.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identity::IdentityKey;

type Builder<V> = Rc<dyn Fn(&dyn Any) -> Option<V>>;

/// Shared mapping from [`IdentityKey`] to a view builder.
pub struct DestinationRegistry<V> {
    builders: Rc<RefCell<FxHashMap<IdentityKey, Builder<V>>>>,
}

impl<V> Clone for DestinationRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            builders: Rc::clone(&self.builders),
        }
    }
}

impl<V> Default for DestinationRegistry<V> {
    fn default() -> Self {
        Self {
            builders: Rc::new(RefCell::new(FxHashMap::default())),
        }
    }
}

impl<V> fmt::Debug for DestinationRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl<V: 'static> DestinationRegistry<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `builder` for path elements of type `T`.
    ///
    /// A later registration for the same type replaces the earlier one.
    pub fn register<T, F>(&self, builder: F)
    where
        T: Any,
        F: Fn(&T) -> V + 'static,
    {
        let key = IdentityKey::of::<T>();
        let erased: Builder<V> =
            Rc::new(move |value: &dyn Any| value.downcast_ref::<T>().map(&builder));
        let replaced = self.builders.borrow_mut().insert(key, erased).is_some();
        debug!(key = %key, replaced, "destination registered");
    }

    /// Remove the builder for `T`, if any.
    pub fn unregister<T: Any>(&self) -> bool {
        self.unregister_key(&IdentityKey::of::<T>())
    }

    /// Remove the builder stored under `key`, if any.
    pub fn unregister_key(&self, key: &IdentityKey) -> bool {
        let removed = self.builders.borrow_mut().remove(key).is_some();
        if removed {
            debug!(key = %key, "destination unregistered");
        }
        removed
    }

    /// Register `builder` for the lifetime of the returned guard.
    #[must_use = "dropping the guard unregisters the destination immediately"]
    pub fn mount<T, F>(&self, builder: F) -> DestinationGuard<V>
    where
        T: Any,
        F: Fn(&T) -> V + 'static,
    {
        self.register::<T, F>(builder);
        DestinationGuard {
            registry: self.clone(),
            key: IdentityKey::of::<T>(),
        }
    }

    /// Build the view for `value` using the builder stored under `key`.
    ///
    /// Returns `None` when no builder is registered for `key`, or when
    /// `value` is not of the type the builder was registered for.
    #[must_use]
    pub fn resolve(&self, key: &IdentityKey, value: &dyn Any) -> Option<V> {
        // Clone the builder out so it may touch the registry itself.
        let builder = self.builders.borrow().get(key).cloned()?;
        builder(value)
    }
}

impl<V> DestinationRegistry<V> {
    #[must_use]
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.builders.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builders.borrow().is_empty()
    }

    /// Registered keys, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<IdentityKey> {
        self.builders.borrow().keys().copied().collect()
    }
}

/// Keeps a destination registered until dropped.
pub struct DestinationGuard<V: 'static> {
    registry: DestinationRegistry<V>,
    key: IdentityKey,
}

impl<V: 'static> DestinationGuard<V> {
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        self.key
    }
}

impl<V: 'static> Drop for DestinationGuard<V> {
    fn drop(&mut self) {
        self.registry.unregister_key(&self.key);
    }
}

impl<V: 'static> fmt::Debug for DestinationGuard<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationGuard")
            .field("key", &self.key)
            .finish()
    }
}
