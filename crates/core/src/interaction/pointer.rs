//! Pointer event source.
//!
//! Auto-close sessions never reach for a global document. They receive clicks
//! from an injected [`PointerEventSource`], which makes them testable without a
//! rendered view.

use tokio::sync::broadcast;

use super::element::ElementPath;

/// A click (or pointer-down) observed anywhere in the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerEvent {
    pub target: ElementPath,
}

impl PointerEvent {
    pub fn new(target: ElementPath) -> Self {
        Self { target }
    }
}

/// Capability to observe every pointer event of the hosting view.
pub trait PointerEventSource: Send + Sync {
    /// Returns a receiver that sees events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<PointerEvent>;
}

/// Broadcast bus fanning pointer events out to every armed session.
#[derive(Clone)]
pub struct PointerBus {
    sender: broadcast::Sender<PointerEvent>,
}

impl PointerBus {
    /// Bus holding up to `capacity` undelivered events per listener.
    ///
    /// A listener that falls further behind loses the oldest events. Auto-close
    /// sessions treat that loss as a possible outside click and close.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PointerEvent) {
        // No session listening is the normal idle case.
        let _ = self.sender.send(event);
    }

    pub fn click(&self, target: ElementPath) {
        self.publish(PointerEvent::new(target));
    }

    /// Number of live listeners, one per armed session.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PointerBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PointerEventSource for PointerBus {
    fn subscribe(&self) -> broadcast::Receiver<PointerEvent> {
        self.sender.subscribe()
    }
}
