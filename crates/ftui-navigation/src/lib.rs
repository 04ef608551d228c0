#![forbid(unsafe_code)]

//! Path-driven stack navigation for FrankenTUI.
//!
//! This crate provides:
//! - [`NavigationStack`] to keep an application-owned path [`Binding`] and a
//!   physical screen stack in sync in both directions
//! - [`DestinationRegistry`] mapping path element types to screen builders
//! - [`StackReconciler`] for the reconcile engine over any [`HostContainer`]
//! - [`LocalDestination`] for child screens presented by a boolean gate
//!
//! Path elements may be of one concrete type or mixed through [`AnyElement`].

/// Shared, version-tracked values owned by the application.
pub mod binding;
/// Stack configuration and environment overrides.
pub mod config;
pub mod error;
/// Host container contract and the in-memory [`ScreenStack`].
pub mod host;
/// Type identity keys and type-erased path elements.
pub mod identity;
pub mod local;
pub mod reconciler;
/// Destination builders keyed by element type.
pub mod registry;
/// Screens and their teardown hooks.
pub mod screen;
pub mod stack;
/// Debounced routing of external path updates.
pub mod update_queue;

pub use binding::{Binding, Watch};
pub use config::{MAX_DEBOUNCE, NavigationConfig, NavigationConfigParse};
pub use error::{ConfigError, NavigationError};
pub use host::{
    HostContainer, PopResult, ScreenStack, StackEntry, TransitionOutcome, TransitionToken,
};
pub use identity::{AnyElement, IdentityKey, PathElement, erase, key_for};
pub use local::{LocalChange, LocalDestination};
pub use reconciler::{
    PopOutcome, ReconcileReport, ReconcileState, StackNavigator, StackReconciler,
};
pub use registry::{DestinationGuard, DestinationRegistry};
pub use screen::{RemovalHook, Screen, ScreenId, ScreenOrigin, ScreenView};
pub use stack::NavigationStack;
pub use update_queue::{PathDebouncer, UpdateAction, UpdateQueue};
