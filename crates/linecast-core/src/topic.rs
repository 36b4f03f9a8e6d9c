//! Topic abstraction for linecast.
//!
//! A topic is a named group of connections. Broadcasting to a topic writes the
//! payload to every member captured when the broadcast starts.

use bytes::Bytes;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::connection::ConnectionId;
use crate::sink::SharedSink;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Compute the 64-bit FNV-1 hash of a topic name.
#[must_use]
pub fn topic_secret(name: &str) -> u64 {
    name.bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            hash.wrapping_mul(FNV_PRIME) ^ u64::from(byte)
        })
}

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of members in the snapshot.
    pub attempted: usize,
    /// Deliveries that completed.
    pub delivered: usize,
    /// Deliveries that failed.
    pub failed: usize,
}

/// A topic for pub/sub messaging.
pub struct Topic {
    /// Topic name.
    name: String,
    /// Hash of the name, fixed at creation. Not used for access control.
    secret: u64,
    /// Current members and their sinks.
    subscribers: Mutex<HashMap<ConnectionId, SharedSink>>,
    /// Serializes broadcasts so every member sees them in the same order.
    delivery: tokio::sync::Mutex<()>,
}

impl Topic {
    /// Create a new, empty topic.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            secret: topic_secret(&name),
            name,
            subscribers: Mutex::new(HashMap::new()),
            delivery: tokio::sync::Mutex::new(()),
        }
    }

    /// Get the topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the secret derived from the topic name.
    #[must_use]
    pub fn secret(&self) -> u64 {
        self.secret
    }

    /// Check if a connection is subscribed.
    #[must_use]
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.lock().contains_key(connection_id)
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Check if the topic has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Add a connection, replacing its sink if it is already subscribed.
    pub fn add_subscriber(&self, connection_id: ConnectionId, sink: SharedSink) {
        debug!(topic = %self.name, connection = %connection_id, "Added subscriber");
        self.subscribers.lock().insert(connection_id, sink);
    }

    /// Remove a connection.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn remove_subscriber(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.subscribers.lock().remove(connection_id).is_some();
        if removed {
            debug!(topic = %self.name, connection = %connection_id, "Removed subscriber");
        }
        removed
    }

    /// Deliver a framed payload to every current subscriber.
    ///
    /// Membership is snapshotted on entry; joins and leaves that happen while
    /// the payload is being written do not affect who receives it. Each
    /// delivery runs concurrently and a failed write never stops the others.
    /// Returns once every attempt has finished.
    pub async fn broadcast(&self, payload: Bytes) -> BroadcastReport {
        let _turn = self.delivery.lock().await;

        let snapshot: Vec<(ConnectionId, SharedSink)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, sink)| (id.clone(), Arc::clone(sink)))
            .collect();

        trace!(topic = %self.name, recipients = snapshot.len(), "Broadcasting");

        let attempts = snapshot.iter().map(|(id, sink)| {
            let payload = payload.clone();
            async move { (id, sink.deliver(payload).await) }
        });

        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..BroadcastReport::default()
        };
        for (id, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    trace!(topic = %self.name, connection = %id, error = %e, "Delivery failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("secret", &self.secret)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
