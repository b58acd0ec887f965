// dispatch.rs — Decoupled subscriber notification.
//
// Appends must never wait on a subscriber. The trail hands each new
// entry to this dispatcher as a LogEvent on a bounded channel; a
// dedicated thread drains the queue and fans events out to every
// registered sink. A full queue drops the notification (with a warning)
// rather than blocking the append path; the trail itself remains the
// source of truth a late consumer can re-query.

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::AuditLogEntry;
use crate::error::AuditError;

/// The event pushed to subscribers on every append.
///
/// Shaped for the real-time transport boundary:
/// `{ "type": "log", "data": <entry>, "timestamp": <when emitted> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: AuditLogEntry,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Wrap a freshly appended entry.
    pub fn log(entry: AuditLogEntry) -> Self {
        Self {
            kind: "log".to_string(),
            data: entry,
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving audit events.
///
/// Implementations decide what to do with each event: write a JSONL
/// line, forward over a websocket, update a dashboard. Errors are
/// logged by the dispatcher but never propagate to the append path.
pub trait AuditSink: Send {
    fn deliver(&self, event: &LogEvent) -> Result<(), AuditError>;
}

/// Fan-out of audit events to registered sinks via a bounded queue.
pub(crate) struct Dispatcher {
    tx: Option<SyncSender<LogEvent>>,
    sinks: Arc<Mutex<Vec<Box<dyn AuditSink>>>>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the dispatcher thread with the given queue depth.
    pub(crate) fn start(queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel::<LogEvent>(queue_depth.max(1));
        let sinks: Arc<Mutex<Vec<Box<dyn AuditSink>>>> = Arc::new(Mutex::new(Vec::new()));

        let drain_sinks = Arc::clone(&sinks);
        let spawned = std::thread::Builder::new()
            .name("warden-audit-dispatch".to_string())
            .spawn(move || {
                // The loop ends when the trail (the only sender) is dropped.
                while let Ok(event) = rx.recv() {
                    let sinks = drain_sinks.lock().unwrap_or_else(|e| e.into_inner());
                    for sink in sinks.iter() {
                        if let Err(e) = sink.deliver(&event) {
                            tracing::warn!("audit sink error: {}", e);
                        }
                    }
                }
            });

        // A spawn failure costs subscriber delivery, never the trail:
        // with no sender held, notify() drops events silently and the
        // trail keeps recording.
        let (tx, handle) = match spawned {
            Ok(handle) => (Some(tx), Some(handle)),
            Err(e) => {
                tracing::error!("audit dispatch thread unavailable: {}", e);
                (None, None)
            }
        };

        Self { tx, sinks, handle }
    }

    /// Register a sink. Takes effect for all subsequent events.
    pub(crate) fn subscribe(&self, sink: Box<dyn AuditSink>) {
        self.sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sink);
    }

    /// Enqueue an event without blocking. A full queue drops the event.
    pub(crate) fn notify(&self, event: LogEvent) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("audit dispatch queue full; notification dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("audit dispatch thread gone; notification dropped");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Close the channel so the drain loop exits, then join it to make
        // sure queued events are delivered before the process moves on.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditAction, AuditLogEntry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(Arc<AtomicUsize>);

    impl AuditSink for CountingSink {
        fn deliver(&self, _event: &LogEvent) -> Result<(), AuditError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn deliver(&self, _event: &LogEvent) -> Result<(), AuditError> {
            Err(AuditError::Capacity {
                message: "sink broken".into(),
            })
        }
    }

    #[test]
    fn events_reach_all_sinks() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        {
            let dispatcher = Dispatcher::start(16);
            dispatcher.subscribe(Box::new(CountingSink(Arc::clone(&count_a))));
            dispatcher.subscribe(Box::new(CountingSink(Arc::clone(&count_b))));

            for _ in 0..3 {
                dispatcher.notify(LogEvent::log(AuditLogEntry::new(
                    "agent-1",
                    AuditAction::Allowed,
                )));
            }
            // Drop joins the drain thread, flushing the queue.
        }
        assert_eq!(count_a.load(Ordering::SeqCst), 3);
        assert_eq!(count_b.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failing_sink_does_not_stop_others() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let dispatcher = Dispatcher::start(16);
            dispatcher.subscribe(Box::new(FailingSink));
            dispatcher.subscribe(Box::new(CountingSink(Arc::clone(&count))));
            dispatcher.notify(LogEvent::log(AuditLogEntry::new(
                "agent-1",
                AuditAction::Denied,
            )));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_without_a_dispatch_thread_drops_silently() {
        // The degraded state when the dispatch thread could not start:
        // no sender, no handle. Appends must keep working.
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher {
            tx: None,
            sinks: Arc::new(Mutex::new(Vec::new())),
            handle: None,
        };
        dispatcher.subscribe(Box::new(CountingSink(Arc::clone(&count))));
        dispatcher.notify(LogEvent::log(AuditLogEntry::new(
            "agent-1",
            AuditAction::Allowed,
        )));

        drop(dispatcher);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn log_event_wire_shape() {
        let event = LogEvent::log(AuditLogEntry::new("agent-1", AuditAction::Allowed));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["data"]["agent_id"], "agent-1");
        assert!(json["timestamp"].is_string());
    }
}
