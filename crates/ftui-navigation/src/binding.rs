#![forbid(unsafe_code)]

//! Externally owned values the navigation layer reads and writes.
//!
//! A [`Binding<T>`] is a shared, version-tracked cell. The application keeps
//! one handle and gives a clone to the navigation stack (for the path) or to
//! a local destination (for its presentation gate). Writes from either side
//! are visible to both.
//!
//! # Invariants
//!
//! 1. `version` increments exactly once per write that changes the value.
//! 2. Writing a value equal to the current one is a no-op.
//! 3. Watchers run in registration order, after the borrow is released, so a
//!    watcher may read the binding.
//! 4. Dropping a [`Watch`] guard stops its callback before the next write.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Watcher<T> = Rc<dyn Fn(&T)>;

struct Slot<T> {
    value: T,
    version: u64,
    watchers: Vec<Weak<dyn Fn(&T)>>,
}

/// Shared handle to an externally owned value.
pub struct Binding<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Binding")
            .field("value", &slot.value)
            .field("version", &slot.version)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Binding<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                value,
                version: 0,
                watchers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.slot.borrow().value.clone()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.borrow().value)
    }

    /// Write `value`. Returns whether it differed from the current value.
    pub fn set(&self, value: T) -> bool {
        {
            let mut slot = self.slot.borrow_mut();
            if slot.value == value {
                return false;
            }
            slot.value = value;
            slot.version += 1;
        }
        self.notify();
        true
    }

    /// Mutate the value in place. Watchers run only if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let changed = {
            let mut slot = self.slot.borrow_mut();
            let before = slot.value.clone();
            f(&mut slot.value);
            let changed = slot.value != before;
            if changed {
                slot.version += 1;
            }
            changed
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// Number of value-changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.slot.borrow().version
    }

    /// Run `callback` after every value-changing write while the guard lives.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        let strong: Watcher<T> = Rc::new(callback);
        self.slot.borrow_mut().watchers.push(Rc::downgrade(&strong));
        Watch {
            _callback: Box::new(strong),
        }
    }

    fn notify(&self) {
        let live: Vec<Watcher<T>> = {
            let mut slot = self.slot.borrow_mut();
            slot.watchers.retain(|w| w.strong_count() > 0);
            slot.watchers.iter().filter_map(Weak::upgrade).collect()
        };
        let value = self.get();
        for watcher in &live {
            watcher(&value);
        }
    }
}

/// Keeps a [`Binding::watch`] callback alive.
pub struct Watch {
    _callback: Box<dyn std::any::Any>,
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch").finish_non_exhaustive()
    }
}
