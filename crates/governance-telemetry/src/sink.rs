//! Event sinks
//!
//! The guardrails engine only knows the [`EventSink`] trait. Hosts pick
//! where events go: the tracing pipeline, a closure forwarding to their
//! own exporter, or a [`BufferedEmitter`](crate::BufferedEmitter) that
//! moves delivery off the request path.

use parking_lot::Mutex;

use crate::{Result, TelemetryEvent};

/// Destination for telemetry events
///
/// `emit` is called on the request path, so implementations must not
/// block for long. Errors are reported to the caller, which logs them;
/// they never change a guardrail verdict.
pub trait EventSink: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: TelemetryEvent) -> Result<()>;

    /// Sink name (for logging/debugging)
    fn name(&self) -> &str {
        "sink"
    }
}

/// Writes each event as a structured `tracing` record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: TelemetryEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(
            target: "governance::telemetry",
            event = event.name(),
            request_id = event.request_id(),
            payload = %payload,
            "telemetry event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Forwards events to a closure
///
/// # Example
///
/// ```
/// use governance_telemetry::{CallbackSink, EventSink, TelemetryEvent};
///
/// let sink = CallbackSink::new(|event: TelemetryEvent| {
///     println!("{}", event.name());
///     Ok(())
/// });
/// assert_eq!(sink.name(), "callback");
/// ```
pub struct CallbackSink<F>
where
    F: Fn(TelemetryEvent) -> Result<()> + Send + Sync,
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(TelemetryEvent) -> Result<()> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(TelemetryEvent) -> Result<()> + Send + Sync,
{
    fn emit(&self, event: TelemetryEvent) -> Result<()> {
        (self.callback)(event)
    }

    fn name(&self) -> &str {
        "callback"
    }
}

/// Keeps every event in memory
///
/// For tests and local debugging.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: TelemetryEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
