//! Firehose fan-out
//!
//! Keeps, per payload type, the channels of every persistent subscriber.
//! Publishing never waits: channels are unbounded, so the read loop hands an
//! event to each subscriber and moves on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;

use super::{DispatchError, DispatchResult};
use crate::catalog::{DecodeError, Payload};

/// One delivered frame
#[derive(Debug, Clone)]
pub struct Event {
    pub payload_type: u32,
    /// The decoded payload, or why it could not be decoded
    pub payload: Result<Payload, DecodeError>,
}

pub type EventSender = mpsc::UnboundedSender<Event>;

#[derive(Default)]
struct Topics {
    next_id: u64,
    sinks: HashMap<u32, Vec<(u64, EventSender)>>,
    closed: bool,
}

/// Per-payload-type subscriber lists
#[derive(Clone, Default)]
pub struct Fanout {
    topics: Arc<Mutex<Topics>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription of its own for `payload_type`
    pub fn subscribe(&self, payload_type: u32) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = self.attach(payload_type, tx);

        Subscription {
            payload_type,
            rx,
            _registration: registration,
        }
    }

    /// Feed `payload_type` into an existing channel
    ///
    /// Several payload types attached to the same channel keep their wire
    /// order relative to each other. Once the fan-out is closed the sender is
    /// dropped on the spot.
    pub fn attach(&self, payload_type: u32, sender: EventSender) -> Registration {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.next_id += 1;
        let id = topics.next_id;
        if !topics.closed {
            topics.sinks.entry(payload_type).or_default().push((id, sender));
        }

        Registration {
            topics: Arc::downgrade(&self.topics),
            payload_type,
            id,
        }
    }

    /// Hand an event to every subscriber of its payload type
    ///
    /// Returns how many subscribers received it. Subscribers whose receiving
    /// end is gone are pruned.
    pub fn publish(&self, event: &Event) -> DispatchResult<usize> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| DispatchError::Internal("fan-out table lock poisoned".to_string()))?;

        let Some(sinks) = topics.sinks.get_mut(&event.payload_type) else {
            return Ok(0);
        };
        sinks.retain(|(_, sender)| sender.send(event.clone()).is_ok());
        let delivered = sinks.len();
        if sinks.is_empty() {
            topics.sinks.remove(&event.payload_type);
        }
        Ok(delivered)
    }

    /// Number of live registrations across all payload types
    pub fn len(&self) -> usize {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.sinks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration and refuse new ones
    ///
    /// Existing streams end once drained; later ones end immediately.
    pub fn close(&self) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.closed = true;
        topics.sinks.clear();
    }

}

/// Keeps a channel attached to a fan-out until dropped
#[derive(Debug)]
pub struct Registration {
    topics: Weak<Mutex<Topics>>,
    payload_type: u32,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(topics) = self.topics.upgrade() else {
            return;
        };
        let mut topics = topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sinks) = topics.sinks.get_mut(&self.payload_type) {
            sinks.retain(|(id, _)| *id != self.id);
            if sinks.is_empty() {
                topics.sinks.remove(&self.payload_type);
            }
        }
    }
}

/// A persistent stream of one payload type
#[derive(Debug)]
pub struct Subscription {
    payload_type: u32,
    rx: mpsc::UnboundedReceiver<Event>,
    _registration: Registration,
}

impl Subscription {
    pub fn payload_type(&self) -> u32 {
        self.payload_type
    }

    /// Next event, or `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}
