#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! Invariant violations (stack mismatches, lifecycle calls on faults,
//! nested forms) are logged where they happen and only surface as these
//! types when the caller has to abort the specific operation. [`Error`] is
//! what element phases return; it is caught once per request by the
//! dispatch pipeline and turned into a failure response.

use woframe_core::{AssociationError, KvcError};

/// Component stack violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("component stack overflow: depth {depth} exceeds maximum {max}")]
    Overflow { depth: usize, max: usize },
    #[error("component stack underflow")]
    Underflow,
    #[error("leave mismatch: expected {expected} on top of stack, found {found}")]
    LeaveMismatch { expected: String, found: String },
}

/// Component resolution and action dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    #[error("operation on unresolved component fault '{name}'")]
    UnresolvedFault { name: String },
    #[error("component {component} has no action named '{action}'")]
    MissingAction { component: String, action: String },
    #[error("no resource manager available to instantiate '{name}'")]
    NoResourceManager { name: String },
    #[error("unknown component '{name}'")]
    UnknownComponent { name: String },
}

/// Session store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStoreError {
    #[error("timed out after {waited_ms}ms waiting to check out session {id}")]
    CheckoutTimeout { id: String, waited_ms: u64 },
    #[error("no session with id {id}")]
    NoSuchSession { id: String },
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// The error type crossing element and handler boundaries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),
    #[error(transparent)]
    Kvc(#[from] KvcError),
    #[error(transparent)]
    Association(#[from] AssociationError),
    /// A user action failed.
    #[error("action failed: {0}")]
    Action(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
