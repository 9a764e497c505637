use crate::events::Event;
use tokio::sync::broadcast;

/// Fan-out of position and trade events to persistence/reporting collaborators.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) -> Result<usize, broadcast::error::SendError<Event>> {
        self.tx.send(event)
    }

    /// Publish without caring whether anyone is listening.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}
