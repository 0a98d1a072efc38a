//! Async input service: crossterm `EventStream` to runtime `Event`s.
//!
//! Keys are mapped to the runtime key model; Ctrl-C is surfaced as its own
//! event so an edit target can never swallow it. Paste payloads and typed
//! characters are never logged, only sizes and key classes.

mod async_service;
mod key_map;

pub use async_service::AsyncInputShutdown;

use async_service::spawn_async_event_task;
use core_events::Event;
use tokio::task::JoinHandle;

#[inline]
pub(crate) fn log_paste(payload: &str) {
    tracing::trace!(target: "input.paste", len = payload.len(), "paste_event");
}

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown handle
/// that can be used to request immediate termination.
pub fn spawn_async_input(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(sender)
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing::dispatcher::Dispatch;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
    }

    #[derive(Default)]
    struct FieldCollector {
        fields: Vec<(String, String)>,
    }

    impl Visit for FieldCollector {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            self.events
                .lock()
                .unwrap()
                .push((event.metadata().target().to_string(), collector.fields));
        }
    }

    #[test]
    fn paste_log_redacts_content() {
        let capture = Capture::default();
        let events = capture.events.clone();
        let dispatch = Dispatch::new(Registry::default().with(capture));

        tracing::dispatcher::with_default(&dispatch, || {
            super::log_paste("secret vote target 🗳");
        });

        let events = events.lock().unwrap();
        let (_, fields) = events
            .iter()
            .find(|(target, _)| target == "input.paste")
            .expect("missing input.paste event");
        assert!(fields.iter().any(|(name, _)| name == "len"));
        for (_, value) in fields {
            assert!(!value.contains("secret vote"), "leaked paste: {value}");
        }
    }
}
