#![forbid(unsafe_code)]

//! Type-derived identity keys for path elements.
//!
//! A path element's [`IdentityKey`] depends only on its runtime type, never on
//! its value. Two `Detail(1)` and `Detail(2)` values share a key; the
//! destination registry applies the builder to the concrete value.
//!
//! Homogeneous paths (`Vec<Route>`) key every element by `Route`. Mixed paths
//! use [`AnyElement`], which forwards the key of the value it wraps, so
//! `AnyElement::new(Detail(1))` and a plain `Detail(1)` resolve the same
//! destination.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Stable, type-scoped lookup key.
///
/// Equality and hashing use the [`TypeId`], which is unique per type for the
/// lifetime of the process even when two crates declare types with the same
/// name. The fully qualified type name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct IdentityKey {
    type_id: TypeId,
    name: &'static str,
}

impl IdentityKey {
    /// Key for the type `T`.
    #[must_use]
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name backing this key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.name
    }

    /// Underlying type id.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether `value` is an instance of the keyed type.
    #[must_use]
    pub fn matches(&self, value: &dyn Any) -> bool {
        value.type_id() == self.type_id
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for IdentityKey {}

impl Hash for IdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdentityKey").field(&self.name).finish()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Bounds every path element must satisfy.
///
/// Blanket-implemented; there is nothing to implement by hand.
pub trait PathElement: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> PathElement for T {}

/// Identity key of a path element, looking through [`AnyElement`].
#[must_use]
pub fn key_for<D: PathElement>(value: &D) -> IdentityKey {
    match (value as &dyn Any).downcast_ref::<AnyElement>() {
        Some(any) => any.identity_key(),
        None => IdentityKey::of::<D>(),
    }
}

/// The value a destination builder should see for `value`.
///
/// For [`AnyElement`] this is the wrapped value, otherwise `value` itself.
#[must_use]
pub fn erase<D: PathElement>(value: &D) -> &dyn Any {
    match (value as &dyn Any).downcast_ref::<AnyElement>() {
        Some(any) => any.as_any(),
        None => value,
    }
}

trait ErasedElement: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn key(&self) -> IdentityKey;
    fn eq_erased(&self, other: &dyn Any) -> bool;
    fn hash_erased(&self, state: &mut dyn Hasher);
}

impl<T: Eq + Hash + fmt::Debug + 'static> ErasedElement for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn key(&self) -> IdentityKey {
        IdentityKey::of::<T>()
    }

    fn eq_erased(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>() == Some(self)
    }

    fn hash_erased(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }
}

/// Type-erased path element for heterogeneous paths.
///
/// Cloning is cheap (shared). Equality requires the same runtime type and
/// equal values.
#[derive(Clone)]
pub struct AnyElement {
    inner: Rc<dyn ErasedElement>,
}

impl AnyElement {
    /// Wrap a value.
    ///
    /// Wrapping an `AnyElement` again returns it unchanged, so keys never
    /// degrade to the wrapper type.
    #[must_use]
    pub fn new<T: Eq + Hash + fmt::Debug + 'static>(value: T) -> Self {
        if let Some(already) = (&value as &dyn Any).downcast_ref::<Self>() {
            return already.clone();
        }
        Self {
            inner: Rc::new(value),
        }
    }

    /// Key of the wrapped value's runtime type.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        self.inner.key()
    }

    /// The wrapped value.
    #[must_use]
    pub fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }

    /// Borrow the wrapped value as `T`, if that is its type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

impl PartialEq for AnyElement {
    fn eq(&self, other: &Self) -> bool {
        self.inner.eq_erased(other.as_any())
    }
}

impl Eq for AnyElement {}

impl Hash for AnyElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_key().hash(state);
        self.inner.hash_erased(state);
    }
}

impl fmt::Debug for AnyElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Detail(u32);

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Settings;

    mod other {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct Detail(pub u32);
    }

    #[test]
    fn key_is_type_based_not_value_based() {
        assert_eq!(key_for(&Detail(1)), key_for(&Detail(2)));
        assert_ne!(key_for(&Detail(1)), key_for(&Settings));
    }

    #[test]
    fn key_is_stable_across_calls() {
        let a = IdentityKey::of::<Detail>();
        let b = IdentityKey::of::<Detail>();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn same_short_name_in_other_module_is_distinct() {
        let ours = IdentityKey::of::<Detail>();
        let theirs = IdentityKey::of::<other::Detail>();
        assert_ne!(ours, theirs);
        assert_ne!(ours.as_str(), theirs.as_str());
        assert!(ours.as_str().ends_with("Detail"));
    }

    #[test]
    fn any_element_forwards_wrapped_key() {
        let wrapped = AnyElement::new(Detail(7));
        assert_eq!(key_for(&wrapped), IdentityKey::of::<Detail>());
        assert_eq!(erase(&wrapped).downcast_ref::<Detail>(), Some(&Detail(7)));
    }

    #[test]
    fn any_element_does_not_double_wrap() {
        let wrapped = AnyElement::new(AnyElement::new(Settings));
        assert_eq!(wrapped.identity_key(), IdentityKey::of::<Settings>());
    }

    #[test]
    fn any_element_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(AnyElement::new(Detail(1)));
        set.insert(AnyElement::new(Detail(1)));
        set.insert(AnyElement::new(Detail(2)));
        set.insert(AnyElement::new(other::Detail(1)));
        assert_eq!(set.len(), 3);
        assert_ne!(AnyElement::new(Detail(1)), AnyElement::new(other::Detail(1)));
    }

    #[test]
    fn key_matches_checks_runtime_type() {
        let key = IdentityKey::of::<Detail>();
        assert!(key.matches(&Detail(3)));
        assert!(!key.matches(&Settings));
    }

    #[test]
    fn display_uses_type_name() {
        let key = IdentityKey::of::<Settings>();
        assert_eq!(key.to_string(), std::any::type_name::<Settings>());
    }
}
