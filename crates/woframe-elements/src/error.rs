#![forbid(unsafe_code)]

/// Failures while building an element from its bindings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementError {
    #[error("{element} requires a '{binding}' binding")]
    MissingBinding {
        element: &'static str,
        binding: &'static str,
    },
    #[error("{element} accepts only one of {bindings}")]
    ConflictingBindings {
        element: &'static str,
        bindings: &'static str,
    },
}
