//! Captures `tracing` events for assertions.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{
    field::{Field, Visit},
    subscriber::DefaultGuard,
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    Layer,
};

/// The parts of an event tests look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    /// Level the event was emitted at.
    pub level: Level,
    /// The event's message.
    pub message: String,
    /// The `outcome` field, if present.
    pub outcome: Option<String>,
}

/// Every event emitted while the guard returned by [`capture_logs`] is alive.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    /// All events in emission order.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events whose message is exactly `message`.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.message == message)
            .collect()
    }

    /// Values of the `outcome` field, in emission order.
    pub fn outcomes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.outcome)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *event.metadata().level(),
                message: fields.message,
                outcome: fields.outcome,
            });
    }
}

#[derive(Debug, Default)]
struct Fields {
    message: String,
    outcome: Option<String>,
}

impl Fields {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "outcome" => self.outcome = Some(value),
            _ => {}
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }
}

/// Routes every event emitted on the current thread to the returned [`CapturedLogs`] until the
/// guard is dropped.
///
/// Only events from the calling thread are seen, so use a current-thread runtime.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.clone()));

    (logs, guard)
}
