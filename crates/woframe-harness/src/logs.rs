#![forbid(unsafe_code)]

//! Structured log capture.
//!
//! [`LogCapture`] owns a `tracing` dispatcher built from a
//! `tracing_subscriber::Registry` plus a collecting layer. Install it for
//! the current thread with [`LogCapture::install`] or run a closure under
//! it with [`LogCapture::in_scope`]. Worker threads can install a clone of
//! [`LogCapture::dispatch`]; every clone feeds the same event list.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::dispatcher::{self, DefaultGuard};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct FieldVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut Vec<(String, String)>,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(self.message);
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            *self.message = rendered;
        } else {
            self.fields.push((field.name().to_owned(), rendered));
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut FieldVisitor {
            message: &mut message,
            fields: &mut fields,
        });
        let metadata = event.metadata();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *metadata.level(),
                target: metadata.target().to_owned(),
                message,
                fields,
            });
    }
}

/// Collects every event emitted under its dispatcher.
#[derive(Clone)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    dispatch: Dispatch,
}

impl fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogCapture")
            .field("events", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl LogCapture {
    pub fn new() -> Self {
        let layer = CaptureLayer::default();
        let events = Arc::clone(&layer.events);
        let dispatch = Dispatch::new(Registry::default().with(layer));
        Self { events, dispatch }
    }

    /// A dispatcher feeding this capture, for installing on other threads.
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    /// Capture on the current thread until the guard drops.
    #[must_use = "capturing stops when the guard is dropped"]
    pub fn install(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Whether any event's message or field value contains `fragment`.
    pub fn contains(&self, fragment: &str) -> bool {
        self.events().iter().any(|event| {
            event.message.contains(fragment) || event.fields.iter().any(|(_, v)| v.contains(fragment))
        })
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.events().iter().filter(|event| event.level == level).count()
    }

    /// Events whose target starts with `prefix`.
    pub fn with_target(&self, prefix: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.target.starts_with(prefix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn events_carry_level_target_and_fields() {
        let capture = LogCapture::new();
        capture.in_scope(|| {
            tracing::warn!(target: "woframe::forms", key = "title", size = 3, "could not push value");
        });
        let events = capture.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::WARN);
        assert_eq!(events[0].target, "woframe::forms");
        assert_eq!(events[0].message, "could not push value");
        assert_eq!(events[0].field("key"), Some("title"));
        assert_eq!(events[0].field("size"), Some("3"));
    }

    #[test]
    fn nothing_is_captured_outside_the_scope() {
        let capture = LogCapture::new();
        tracing::error!("elsewhere");
        assert!(capture.is_empty());
        {
            let _guard = capture.install();
            tracing::error!("here");
        }
        tracing::error!("elsewhere again");
        assert_eq!(capture.count_at(Level::ERROR), 1);
        assert!(capture.contains("here"));
    }

    #[test]
    fn worker_threads_feed_the_same_capture() {
        let capture = LogCapture::new();
        let dispatch = capture.dispatch();
        std::thread::spawn(move || {
            dispatcher::with_default(&dispatch, || tracing::info!(target: "worker", "hello"));
        })
        .join()
        .expect("worker");
        assert_eq!(capture.with_target("worker").len(), 1);
        capture.clear();
        assert!(capture.is_empty());
    }
}
