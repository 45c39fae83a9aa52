//! Managed events forwarded to Rust handlers
//!
//! A subscription registers a relay under a fresh context and hands the glue
//! component [`dispatch_event`]. Handlers run on whatever thread raised the
//! event; [`EventQueue`] moves events to a consumer thread instead.

use core::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use super::registry::{self, ContextKey};
use crate::adapter::adapter;
use crate::logging;
use crate::marshal::read_wide;
use crate::object::{DotNetObject, ObjectRef};

/// Receives managed events
///
/// `source` and `args` are new references owned by the handler.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, name: &str, source: DotNetObject, args: DotNetObject);
}

impl<F> EventHandler for F
where
    F: Fn(&str, DotNetObject, DotNetObject) + Send + Sync,
{
    fn handle_event(&self, name: &str, source: DotNetObject, args: DotNetObject) {
        self(name, source, args)
    }
}

struct EventRelay {
    handler: Arc<dyn EventHandler>,
}

unsafe extern "system" fn dispatch_event(
    context: *mut c_void,
    event_name: *const u16,
    source: *mut c_void,
    args: *mut c_void,
) {
    // Adopt first so both references are released on every path.
    let source = DotNetObject::new(ObjectRef::from_raw(source));
    let args = DotNetObject::new(ObjectRef::from_raw(args));

    let Some(relay) = registry::lookup::<EventRelay>(context) else {
        logging::log_dangling_context(context);
        return;
    };

    let name = read_wide(event_name);
    let handled = catch_unwind(AssertUnwindSafe(|| {
        relay.handler.handle_event(&name, source, args)
    }));
    if handled.is_err() {
        logging::log_callback_error("event", &name);
    }
}

/// Active event subscription; dropping it removes the handler
#[must_use = "the handler is removed when the subscription is dropped"]
pub struct EventSubscription {
    source: ObjectRef,
    event: String,
    context: Option<ContextKey>,
}

impl EventSubscription {
    pub(crate) fn subscribe(source: &ObjectRef, event: &str, handler: Arc<dyn EventHandler>) -> Self {
        let context = registry::register(Arc::new(EventRelay { handler }));
        let source = source.clone();
        adapter().add_event_handler(&source, event, context.as_ptr(), dispatch_event);
        tracing::debug!(event = "event_subscribe", name = event, "Event handler added");
        Self {
            source,
            event: event.to_string(),
            context: Some(context),
        }
    }

    /// Name of the subscribed event
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the handler now
    pub fn unsubscribe(self) {}
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            adapter().remove_event_handler(&self.source, &self.event, context.as_ptr());
            registry::unregister(context);
        }
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("event", &self.event)
            .field("source", &self.source)
            .finish()
    }
}

/// Event captured by an [`EventQueue`]
#[derive(Debug)]
pub struct QueuedEvent {
    pub name: String,
    pub source: DotNetObject,
    pub args: DotNetObject,
}

/// Handler that queues events for another thread
///
/// ```ignore
/// let queue = Arc::new(EventQueue::new());
/// let _sub = foo.subscribe_event("PropertyChanged", queue.clone());
/// for event in queue.drain() { /* ... */ }
/// ```
#[derive(Clone)]
pub struct EventQueue {
    sender: flume::Sender<QueuedEvent>,
    receiver: flume::Receiver<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Queue holding at most `capacity` events; raising threads block when full
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity);
        Self { sender, receiver }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn try_recv(&self) -> Option<QueuedEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<QueuedEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Every event queued so far, in arrival order
    pub fn drain(&self) -> Vec<QueuedEvent> {
        self.receiver.try_iter().collect()
    }

    /// Receiving end, for `select`-style consumers
    pub fn receiver(&self) -> &flume::Receiver<QueuedEvent> {
        &self.receiver
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for EventQueue {
    fn handle_event(&self, name: &str, source: DotNetObject, args: DotNetObject) {
        let _ = self.sender.send(QueuedEvent {
            name: name.to_string(),
            source,
            args,
        });
    }
}
