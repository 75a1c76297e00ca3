//! Buffered, non-blocking event emitter

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::{EventSink, Result, TelemetryError, TelemetryEvent};

/// Delivery counters of a [`BufferedEmitter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    /// Events handed to the inner sink successfully
    pub delivered: u64,
    /// Events discarded because the buffer was full
    pub dropped: u64,
    /// Events the inner sink rejected
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Bounded buffer in front of a slower sink
///
/// `emit` never waits: events go into a fixed-capacity channel and a
/// background task forwards them to the inner sink. When the buffer is
/// full the oldest queued event is discarded and counted in
/// [`EmitterStats::dropped`].
pub struct BufferedEmitter {
    sender: RwLock<Option<broadcast::Sender<TelemetryEvent>>>,
    drain: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl BufferedEmitter {
    /// Start an emitter draining into `inner`
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `inner` - Sink receiving the events
    /// * `capacity` - Maximum number of queued events, rounded up to a
    ///   power of two by the channel
    pub fn spawn(inner: Arc<dyn EventSink>, capacity: usize) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| TelemetryError::sink(format!("No tokio runtime for emitter: {}", e)))?;

        let (sender, receiver) = broadcast::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let drain = handle.spawn(drain(receiver, inner, Arc::clone(&counters)));

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            drain: Mutex::new(Some(drain)),
            counters,
        })
    }

    /// Current delivery counters
    pub fn stats(&self) -> EmitterStats {
        EmitterStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting events and wait for the queue to drain
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        // Dropping the last sender closes the channel once the queue is empty.
        self.sender.write().take();

        let drain = self.drain.lock().take();
        if let Some(drain) = drain {
            if let Err(e) = drain.await {
                tracing::warn!("Telemetry drain task ended abnormally: {}", e);
            }
        }
    }
}

impl EventSink for BufferedEmitter {
    fn emit(&self, event: TelemetryEvent) -> Result<()> {
        let guard = self.sender.read();
        let sender = guard.as_ref().ok_or(TelemetryError::Closed)?;

        sender
            .send(event)
            .map(|_| ())
            .map_err(|_| TelemetryError::sink("telemetry drain task is not running"))
    }

    fn name(&self) -> &str {
        "buffered"
    }
}

async fn drain(
    mut receiver: broadcast::Receiver<TelemetryEvent>,
    inner: Arc<dyn EventSink>,
    counters: Arc<Counters>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => match inner.emit(event) {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(sink = inner.name(), "Telemetry delivery failed: {}", e);
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                counters.dropped.fetch_add(skipped, Ordering::Relaxed);
                tracing::warn!("Telemetry buffer full, dropped {} oldest events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallbackSink, MemorySink};
    use governance_core::RequestContext;

    fn event(rule: &str) -> TelemetryEvent {
        TelemetryEvent::decision(&RequestContext::anonymous(), "guardrail_check_input", "block", rule, "test")
    }

    fn rule_of(event: &TelemetryEvent) -> String {
        match event {
            TelemetryEvent::GuardrailDecision { rule_name, .. } => rule_name.clone(),
            TelemetryEvent::CostRecorded { .. } => String::new(),
        }
    }

    #[tokio::test]
    async fn test_events_reach_inner_sink() {
        let memory = Arc::new(MemorySink::new());
        let emitter = BufferedEmitter::spawn(memory.clone(), 16).unwrap();

        emitter.emit(event("a")).unwrap();
        emitter.emit(event("b")).unwrap();
        emitter.shutdown().await;

        let rules: Vec<String> = memory.events().iter().map(rule_of).collect();
        assert_eq!(rules, vec!["a", "b"]);
        assert_eq!(emitter.stats().delivered, 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_buffer_drops_oldest() {
        let memory = Arc::new(MemorySink::new());
        let emitter = BufferedEmitter::spawn(memory.clone(), 2).unwrap();

        // The drain task cannot run until this task yields, so all five
        // sends land in a two-slot buffer.
        for rule in ["r1", "r2", "r3", "r4", "r5"] {
            emitter.emit(event(rule)).unwrap();
        }
        emitter.shutdown().await;

        let rules: Vec<String> = memory.events().iter().map(rule_of).collect();
        assert_eq!(rules, vec!["r4", "r5"]);
        assert_eq!(emitter.stats().dropped, 3);
    }

    #[tokio::test]
    async fn test_emit_after_shutdown_fails() {
        let emitter = BufferedEmitter::spawn(Arc::new(MemorySink::new()), 4).unwrap();
        emitter.shutdown().await;
        emitter.shutdown().await;

        assert!(matches!(emitter.emit(event("late")), Err(TelemetryError::Closed)));
    }

    #[tokio::test]
    async fn test_inner_failures_are_counted() {
        let failing = Arc::new(CallbackSink::new(|_event| Err(TelemetryError::sink("down"))));
        let emitter = BufferedEmitter::spawn(failing, 4).unwrap();

        emitter.emit(event("x")).unwrap();
        emitter.shutdown().await;

        assert_eq!(emitter.stats(), EmitterStats { delivered: 0, dropped: 0, failed: 1 });
    }

    #[test]
    fn test_spawn_outside_runtime_is_an_error() {
        let result = BufferedEmitter::spawn(Arc::new(MemorySink::new()), 4);
        assert!(result.is_err());
    }
}
