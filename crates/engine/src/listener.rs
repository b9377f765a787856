// Event Listeners
//
// This module provides the EventListener trait for observing the engine.
// Listeners are called by the engine driver, in event order, for:
// - Collecting task outcomes (the only channel carrying TaskDone)
// - Logging step boundaries
// - Forwarding events into async consumers (ChannelListener / EventStream)

use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info};

use crate::cycle::panic_message;
use crate::event::EngineEvent;

// ============================================================================
// EventListener Trait
// ============================================================================

/// Trait for listening to engine events.
///
/// Listeners are called synchronously on the engine driver, so they should
/// be fast and non-blocking. For heavy processing, forward the event into a
/// channel (see [`ChannelListener`]) and handle it elsewhere.
///
/// # Example
///
/// ```ignore
/// struct DoneCounter(AtomicUsize);
///
/// impl EventListener for DoneCounter {
///     fn on_event(&self, _event: &EngineEvent) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
///
///     fn event_kinds(&self) -> Option<Vec<&'static str>> {
///         Some(vec![event_kinds::TASK_DONE])
///     }
/// }
/// ```
pub trait EventListener: Send + Sync {
    /// Called for every event this listener accepts.
    fn on_event(&self, event: &EngineEvent);

    /// Optional: Filter which event kinds this listener cares about.
    ///
    /// Return `None` to receive all events (default).
    fn event_kinds(&self) -> Option<Vec<&'static str>> {
        None
    }

    /// Human-readable name for logging/debugging.
    fn name(&self) -> &'static str {
        "EventListener"
    }

    /// A closed listener is removed by the engine after the current event.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Identifier returned when a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// NoopEventListener
// ============================================================================

/// No-op event listener.
#[derive(Debug, Clone, Default)]
pub struct NoopEventListener;

impl EventListener for NoopEventListener {
    fn on_event(&self, _event: &EngineEvent) {}

    fn name(&self) -> &'static str {
        "NoopEventListener"
    }
}

// ============================================================================
// TracingListener
// ============================================================================

/// Logs every event through `tracing`.
///
/// Registered automatically when `EngineConfig::trace_events` is set.
#[derive(Debug, Clone, Default)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::TaskDone(done) => {
                info!(task_id = %done.id, status = %done.status, "task done");
            }
            EngineEvent::StatusChanged { status } => {
                debug!(%status, "engine status changed");
            }
            other => {
                debug!(kind = other.kind(), task_id = ?other.task_id(), "engine event");
            }
        }
    }

    fn name(&self) -> &'static str {
        "TracingListener"
    }
}

// ============================================================================
// ChannelListener
// ============================================================================

/// Forwards events into an unbounded channel.
///
/// The listener reports itself closed once the receiving side is dropped,
/// which is how dropping an [`EventStream`] unsubscribes it.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiver its events go to
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &EngineEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(kind = event.kind(), "event stream dropped, discarding event");
        }
    }

    fn name(&self) -> &'static str {
        "ChannelListener"
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Stream of engine events returned by `Engine::subscribe`
#[derive(Debug)]
pub struct EventStream {
    inner: UnboundedReceiverStream<EngineEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Receive the next event; `None` once the engine has shut down
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.inner.next().await
    }
}

impl Stream for EventStream {
    type Item = EngineEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Ordered set of listeners owned by the engine driver.
///
/// A listener that panics is removed; the event still reaches the others.
#[derive(Default)]
pub(crate) struct EventBus {
    listeners: Vec<(ListenerId, Arc<dyn EventListener>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ListenerId, listener: Arc<dyn EventListener>) {
        debug!(%id, listener = listener.name(), "listener added");
        self.listeners.push((id, listener));
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        before != self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn publish(&mut self, event: &EngineEvent) {
        let mut panicked = Vec::new();

        for (id, listener) in &self.listeners {
            // Check if listener wants this event kind
            if let Some(kinds) = listener.event_kinds() {
                if !kinds.contains(&event.kind()) {
                    continue;
                }
            }

            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if let Err(payload) = delivered {
                error!(
                    %id,
                    listener = listener.name(),
                    kind = event.kind(),
                    message = panic_message(payload.as_ref()),
                    "listener panicked, removing it"
                );
                panicked.push(*id);
            }
        }

        self.listeners.retain(|(id, listener)| {
            if panicked.contains(id) {
                return false;
            }
            let closed = listener.is_closed();
            if closed {
                debug!(%id, listener = listener.name(), "pruning closed listener");
            }
            !closed
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineStatus;
    use crate::event::event_kinds;
    use crate::task::{TaskDone, TaskId};
    use std::sync::atomic::AtomicU32;

    struct CountingListener {
        count: AtomicU32,
        kinds: Option<Vec<&'static str>>,
    }

    impl EventListener for CountingListener {
        fn on_event(&self, _event: &EngineEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        fn event_kinds(&self) -> Option<Vec<&'static str>> {
            self.kinds.clone()
        }
    }

    fn status_event() -> EngineEvent {
        EngineEvent::StatusChanged {
            status: EngineStatus::Off,
        }
    }

    #[test]
    fn test_default_listener_metadata() {
        let listener = NoopEventListener;
        assert_eq!(listener.name(), "NoopEventListener");
        assert!(listener.event_kinds().is_none());
        assert!(!listener.is_closed());
        listener.on_event(&status_event());
    }

    #[test]
    fn test_bus_filters_by_kind() {
        let all = Arc::new(CountingListener {
            count: AtomicU32::new(0),
            kinds: None,
        });
        let done_only = Arc::new(CountingListener {
            count: AtomicU32::new(0),
            kinds: Some(vec![event_kinds::TASK_DONE]),
        });

        let mut bus = EventBus::new();
        bus.add(ListenerId::next(), all.clone());
        bus.add(ListenerId::next(), done_only.clone());

        bus.publish(&status_event());
        bus.publish(&EngineEvent::TaskDone(TaskDone::stopped(TaskId::new())));

        assert_eq!(all.count.load(Ordering::SeqCst), 2);
        assert_eq!(done_only.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bus_remove() {
        let listener = Arc::new(CountingListener {
            count: AtomicU32::new(0),
            kinds: None,
        });
        let id = ListenerId::next();

        let mut bus = EventBus::new();
        bus.add(id, listener.clone());
        assert!(bus.remove(id));
        assert!(!bus.remove(id));

        bus.publish(&status_event());
        assert_eq!(listener.count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_closed_channel_listener_is_pruned() {
        let (listener, rx) = ChannelListener::new();
        let mut bus = EventBus::new();
        bus.add(ListenerId::next(), Arc::new(listener));

        drop(rx);
        bus.publish(&status_event());

        assert_eq!(bus.len(), 0);
    }

    #[tokio::test]
    async fn test_event_stream_receives_in_order() {
        let (listener, rx) = ChannelListener::new();
        let mut stream = EventStream::new(rx);
        let id = TaskId::new();

        listener.on_event(&EngineEvent::TaskEnqueued { id });
        listener.on_event(&status_event());

        assert_eq!(stream.recv().await, Some(EngineEvent::TaskEnqueued { id }));
        assert_eq!(stream.recv().await, Some(status_event()));
    }

    struct PanickingListener;

    impl EventListener for PanickingListener {
        fn on_event(&self, _event: &EngineEvent) {
            panic!("listener bug");
        }

        fn name(&self) -> &'static str {
            "PanickingListener"
        }
    }

    #[test]
    fn test_panicking_listener_is_removed_and_others_still_notified() {
        let before = Arc::new(CountingListener {
            count: AtomicU32::new(0),
            kinds: None,
        });
        let after = Arc::new(CountingListener {
            count: AtomicU32::new(0),
            kinds: None,
        });

        let mut bus = EventBus::new();
        bus.add(ListenerId::next(), before.clone());
        bus.add(ListenerId::next(), Arc::new(PanickingListener));
        bus.add(ListenerId::next(), after.clone());

        bus.publish(&status_event());
        assert_eq!(bus.len(), 2);
        assert_eq!(before.count.load(Ordering::SeqCst), 1);
        assert_eq!(after.count.load(Ordering::SeqCst), 1);

        bus.publish(&status_event());
        assert_eq!(after.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        assert_ne!(ListenerId::next(), ListenerId::next());
    }
}
