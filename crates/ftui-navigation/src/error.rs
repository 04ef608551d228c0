#![forbid(unsafe_code)]

//! Error types for navigation operations and configuration parsing.

use std::fmt;

use crate::host::TransitionToken;
use crate::screen::ScreenId;

/// Errors from stack operations that cannot be satisfied.
///
/// Unresolved destinations are not errors: they are recovered with a
/// placeholder screen and a logged warning, never surfaced as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// A pop-to target is not in the host stack.
    ScreenNotInStack(ScreenId),
    /// A transition completion arrived for a token that is not pending.
    UnknownTransition(TransitionToken),
    /// The path notification receiver was already handed out.
    ReceiverTaken,
    /// The host stack has no root screen, or a replacement did not keep it first.
    MissingRoot,
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScreenNotInStack(id) => write!(f, "screen {id} is not in the stack"),
            Self::UnknownTransition(token) => write!(f, "no pending transition {token}"),
            Self::ReceiverTaken => write!(f, "path receiver already taken"),
            Self::MissingRoot => write!(f, "host stack must keep its root screen first"),
        }
    }
}

impl std::error::Error for NavigationError {}

/// One configuration violation with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(
        field: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}
