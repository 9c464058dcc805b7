//! Observability for the batching engine
//!
//! - Structured logging (JSON lines)
//! - Monotonic counters
//!
//! Observability is read-only: nothing here can fail or alter a flush.
//!
//! ```ignore
//! use graphbatch::observability::{log_event, Event};
//!
//! log_event(Event::FlushComplete, &[("groups", "2")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{BatchMetrics, MetricsSnapshot};

/// Severity an event is logged at
pub fn event_severity(event: Event) -> Severity {
    if event.is_failure() {
        Severity::Error
    } else if event.is_detail() {
        Severity::Trace
    } else {
        Severity::Info
    }
}

/// Log a batching event with fields
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event_severity(event), event.as_str(), fields);
}
