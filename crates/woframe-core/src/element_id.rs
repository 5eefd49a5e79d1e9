#![forbid(unsafe_code)]

//! Element ID cursor.
//!
//! Stateless template elements are shared across requests, so they cannot
//! remember where they sit in a page. Instead the context carries a
//! dot-separated cursor (`0.3.1.0`) that container elements extend while
//! descending and trim while leaving. The same tree shape produces the same
//! IDs in every phase, which is what lets a form submit find its widget.
//!
//! # Invariants
//!
//! 1. Every `append*` must be paired with exactly one `delete_last` by the
//!    same element in the same phase.
//! 2. `increment_last` only touches the last segment, it never changes the
//!    depth.
//! 3. `as_str()` is always the segments joined by `.`, with no leading or
//!    trailing separator.
//!
//! # Failure Modes
//!
//! | Call | Condition | Result |
//! |------|-----------|--------|
//! | `delete_last` | empty cursor | logged, no-op |
//! | `increment_last` | empty cursor or named last segment | logged, no-op |

use std::fmt;

/// Mutable dot-separated element address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementId {
    buf: String,
    /// Byte offset at which each segment starts.
    starts: Vec<usize>,
}

impl ElementId {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an existing ID (as found in a component action URL).
    pub fn parse(id: &str) -> Self {
        let mut eid = Self::new();
        for segment in id.split('.').filter(|s| !s.is_empty()) {
            eid.append(segment);
        }
        eid
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.buf.split('.').filter(|s| !s.is_empty())
    }

    pub fn last(&self) -> Option<&str> {
        self.starts.last().map(|&start| &self.buf[start..])
    }

    /// Append a named or numeric segment.
    pub fn append(&mut self, segment: &str) {
        if !self.starts.is_empty() {
            self.buf.push('.');
        }
        self.starts.push(self.buf.len());
        self.buf.push_str(segment);
    }

    pub fn append_int(&mut self, segment: u64) {
        self.append(&segment.to_string());
    }

    /// Append a `0` segment, used when entering a list of children.
    pub fn append_zero(&mut self) {
        self.append("0");
    }

    /// Advance the last numeric segment by one.
    pub fn increment_last(&mut self) {
        let Some(last) = self.last() else {
            tracing::warn!(target: "woframe::context", "increment on an empty element id");
            return;
        };
        let Ok(current) = last.parse::<u64>() else {
            tracing::warn!(
                target: "woframe::context",
                element_id = %self.buf,
                "cannot increment a named element id segment"
            );
            return;
        };
        self.delete_last();
        self.append_int(current.saturating_add(1));
    }

    pub fn delete_last(&mut self) {
        let Some(start) = self.starts.pop() else {
            tracing::warn!(target: "woframe::context", "delete on an empty element id");
            return;
        };
        // Drop the separator too, unless this was the first segment.
        self.buf.truncate(start.saturating_sub(1));
    }

    pub fn delete_all(&mut self) {
        self.buf.clear();
        self.starts.clear();
    }

    /// True if `other` names this element or one of its descendants.
    pub fn is_prefix_of(&self, other: &str) -> bool {
        if self.buf.is_empty() {
            return true;
        }
        other == self.buf
            || other
                .strip_prefix(self.buf.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}
