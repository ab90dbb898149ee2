use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex, PoisonError,
};

use crate::RepositoryEvent;

/// Trait for consuming events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RepositoryEvent);
}

/// Channel-based event sink.
///
/// Sends events through a standard mpsc channel. The receiver end
/// can be polled by any consumer.
pub struct ChannelSink {
    sender: Mutex<Sender<RepositoryEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<RepositoryEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: RepositoryEvent) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = sender.send(event);
    }
}

/// No-op event sink.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: RepositoryEvent) {}
}

/// Collector sink that stores all events for inspection.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<RepositoryEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<RepositoryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: RepositoryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
