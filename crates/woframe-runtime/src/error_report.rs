#![forbid(unsafe_code)]

//! Validation error collection scoped to a template subtree.
//!
//! A form (or any element) pushes a fresh [`ErrorReport`] before processing
//! its content and pops it afterwards; widgets that fail to push a value
//! into their binding record an [`ErrorItem`] in the innermost report.

use woframe_core::Value;

/// One failed field.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorItem {
    pub element_id: Option<String>,
    pub name: Option<String>,
    pub value: Value,
    pub message: String,
}

/// Errors collected for one subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorReport {
    items: Vec<ErrorItem>,
    marked: Vec<String>,
}

impl ErrorReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, item: ErrorItem) {
        self.items.push(item);
    }

    /// Shorthand for a field-level error.
    pub fn add_error_for_field(
        &mut self,
        element_id: &str,
        name: &str,
        value: Value,
        message: impl Into<String>,
    ) {
        self.add_error(ErrorItem {
            element_id: Some(element_id.to_owned()),
            name: Some(name.to_owned()),
            value,
            message: message.into(),
        });
    }

    pub fn errors(&self) -> &[ErrorItem] {
        &self.items
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_for_element_id(&self, element_id: &str) -> Option<&ErrorItem> {
        self.items
            .iter()
            .find(|item| item.element_id.as_deref() == Some(element_id))
    }

    pub fn error_for_name(&self, name: &str) -> Option<&ErrorItem> {
        self.items.iter().find(|item| item.name.as_deref() == Some(name))
    }

    /// Flag a field as problematic without a message (e.g. for styling).
    pub fn mark_field(&mut self, name: &str) {
        if !self.marked.iter().any(|m| m == name) {
            self.marked.push(name.to_owned());
        }
    }

    pub fn is_field_marked(&self, name: &str) -> bool {
        self.marked.iter().any(|m| m == name) || self.error_for_name(name).is_some()
    }

    /// Append `other`'s entries, used when a nested report is folded into
    /// its parent.
    pub fn merge(&mut self, other: ErrorReport) {
        self.items.extend(other.items);
        for name in other.marked {
            self.mark_field(&name);
        }
    }
}
