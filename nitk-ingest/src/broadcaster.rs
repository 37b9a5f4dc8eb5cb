//! Live result fan-out
//!
//! Holds the set of connected subscribers and pushes each serialized
//! result to all of them. A subscriber whose send fails is dropped so one
//! dead connection never blocks delivery to the rest.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::IngestError;

pub type SubscriberId = Uuid;

/// A live consumer of result messages
pub trait Subscriber: Send + Sync {
    fn send(&self, message: &str) -> Result<(), IngestError>;
}

/// Subscriber backed by an unbounded channel, drained by a connection task
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Subscriber for ChannelSubscriber {
    fn send(&self, message: &str) -> Result<(), IngestError> {
        self.tx
            .send(message.to_string())
            .map_err(|_| IngestError::Broadcast("subscriber connection closed".to_string()))
    }
}

/// Set of live subscribers
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = Uuid::new_v4();
        let count = {
            let mut subs = self.subscribers.write().await;
            subs.insert(id, subscriber);
            subs.len()
        };
        debug!(%id, count, "Subscriber connected");
        id
    }

    /// Remove a subscriber; returns false if it was already gone
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!(%id, "Subscriber disconnected");
        }
        removed
    }

    /// Deliver `message` to every subscriber; returns how many accepted it
    pub async fn broadcast(&self, message: &str) -> usize {
        let mut subs = self.subscribers.write().await;
        let mut delivered = 0;
        subs.retain(|id, subscriber| match subscriber.send(message) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                debug!(%id, "Dropping subscriber after failed send: {}", e);
                false
            }
        });
        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
