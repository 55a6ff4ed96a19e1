//! Notifications emitted by requests and sessions.
//!
//! Emitters hold a `ListenerSet` and fan each notification out to a
//! snapshot of its subscribers, so a listener may subscribe or unsubscribe
//! from inside a callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Observer for request and session notifications.
///
/// Every method defaults to a no-op so listeners only implement the channels
/// they care about. Methods may be called from a transport task, never while
/// the emitter holds an internal lock.
pub trait ChatEventListener: Send + Sync {
    /// An incremental content fragment, never the cumulative text.
    fn on_stream_delta(&self, _delta: &str) {}

    fn on_completed(&self, _text: &str) {}

    fn on_failed(&self, _message: &str) {}

    /// Only emitted when the request was built with `debug` enabled.
    fn on_debug(&self, _message: &str) {}
}

/// Handle returned by `subscribe`, used to detach a listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Set of subscribed listeners with snapshot fan-out.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn ChatEventListener>)>>,
}

impl ListenerSet {
    pub(crate) fn subscribe(&self, listener: Arc<dyn ChatEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub(crate) fn emit_stream_delta(&self, delta: &str) {
        for listener in self.snapshot() {
            listener.on_stream_delta(delta);
        }
    }

    pub(crate) fn emit_completed(&self, text: &str) {
        for listener in self.snapshot() {
            listener.on_completed(text);
        }
    }

    pub(crate) fn emit_failed(&self, message: &str) {
        for listener in self.snapshot() {
            listener.on_failed(message);
        }
    }

    pub(crate) fn emit_debug(&self, message: &str) {
        for listener in self.snapshot() {
            listener.on_debug(message);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ChatEventListener>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

/// Notification forwarded by [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    StreamDelta(String),
    Completed(String),
    Failed(String),
    Debug(String),
}

impl ChatEvent {
    /// Whether this event ends a request or a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Completed(_) | ChatEvent::Failed(_))
    }
}

/// Listener that forwards every notification into an unbounded channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn forward(&self, event: ChatEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl ChatEventListener for ChannelListener {
    fn on_stream_delta(&self, delta: &str) {
        self.forward(ChatEvent::StreamDelta(delta.to_string()));
    }

    fn on_completed(&self, text: &str) {
        self.forward(ChatEvent::Completed(text.to_string()));
    }

    fn on_failed(&self, message: &str) {
        self.forward(ChatEvent::Failed(message.to_string()));
    }

    fn on_debug(&self, message: &str) {
        self.forward(ChatEvent::Debug(message.to_string()));
    }
}
