//! In-process message broker with named point-to-point destinations

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::features::backend::ports::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub index_name: String,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct Destination {
    sender: UnboundedSender<QueueMessage>,
    /// Taken by the single consumer
    receiver: Mutex<Option<UnboundedReceiver<QueueMessage>>>,
}

impl Destination {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

/// Messages published before a consumer subscribes are buffered.
#[derive(Debug)]
pub struct QueueBroker {
    destinations: DashMap<String, Destination>,
    online: AtomicBool,
    publish_attempts: AtomicU64,
}

impl Default for QueueBroker {
    fn default() -> Self {
        Self {
            destinations: DashMap::new(),
            online: AtomicBool::new(true),
            publish_attempts: AtomicU64::new(0),
        }
    }
}

impl QueueBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `name` if missing
    pub fn declare(&self, name: &str) {
        self.destinations
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(destination = name, "destination declared");
                Destination::new()
            });
    }

    pub fn destinations(&self) -> Vec<String> {
        let mut names: Vec<_> = self.destinations.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn publish(&self, destination: &str, message: QueueMessage) -> Result<(), TransportError> {
        self.publish_attempts.fetch_add(1, Ordering::AcqRel);
        if !self.online.load(Ordering::Acquire) {
            return Err(TransportError::DestinationUnavailable(destination.to_string()));
        }
        let sender = self
            .destinations
            .get(destination)
            .map(|d| d.sender.clone())
            .ok_or_else(|| TransportError::DestinationUnavailable(destination.to_string()))?;
        sender
            .send(message)
            .map_err(|_| TransportError::Disconnected(destination.to_string()))
    }

    /// Take the consumer side of `destination`, declaring it if needed
    pub fn subscribe(&self, destination: &str) -> Result<UnboundedReceiver<QueueMessage>, TransportError> {
        self.declare(destination);
        self.destinations
            .get(destination)
            .and_then(|d| d.receiver.lock().take())
            .ok_or_else(|| {
                TransportError::DestinationUnavailable(format!("{} already has a consumer", destination))
            })
    }

    /// Simulate the broker going down or coming back
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn publish_attempts(&self) -> u64 {
        self.publish_attempts.load(Ordering::Acquire)
    }

    /// Drop every destination; consumers see end of stream once drained
    pub fn close(&self) {
        self.online.store(false, Ordering::Release);
        self.destinations.clear();
        tracing::info!("queue broker closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &[u8]) -> QueueMessage {
        QueueMessage {
            index_name: "books".to_string(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_publish_before_subscribe_is_buffered() {
        let broker = QueueBroker::new();
        broker.declare("q");
        broker.publish("q", message(&[1])).unwrap();

        let mut rx = broker.subscribe("q").unwrap();
        assert_eq!(rx.try_recv().unwrap().payload, vec![1]);
    }

    #[test]
    fn test_undeclared_destination_is_unavailable() {
        let broker = QueueBroker::new();
        assert_eq!(
            broker.publish("nowhere", message(&[])),
            Err(TransportError::DestinationUnavailable("nowhere".to_string()))
        );
    }

    #[test]
    fn test_single_consumer() {
        let broker = QueueBroker::new();
        let _rx = broker.subscribe("q").unwrap();
        assert!(broker.subscribe("q").is_err());
    }

    #[test]
    fn test_offline_counts_attempts() {
        let broker = QueueBroker::new();
        broker.declare("q");
        broker.set_online(false);
        assert!(broker.publish("q", message(&[])).is_err());
        broker.set_online(true);
        assert!(broker.publish("q", message(&[])).is_ok());
        assert_eq!(broker.publish_attempts(), 2);
    }

    #[test]
    fn test_consumer_gone_is_disconnected() {
        let broker = QueueBroker::new();
        drop(broker.subscribe("q").unwrap());
        assert_eq!(
            broker.publish("q", message(&[])),
            Err(TransportError::Disconnected("q".to_string()))
        );
    }
}
