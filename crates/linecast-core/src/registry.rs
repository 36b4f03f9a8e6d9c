//! Topic registry for linecast.
//!
//! The registry owns every live topic, creates topics on first subscribe,
//! deletes them as soon as an unsubscribe leaves them empty, and routes
//! decoded protocol events to topic operations.

use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use linecast_protocol::{encode_delivery, Event};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::connection::ConnectionId;
use crate::sink::SharedSink;
use crate::topic::{BroadcastReport, Topic};

/// The process-wide topic registry.
///
/// Creating a topic and deleting an emptied one both run under the map's
/// shard lock for that name, together with the membership change that
/// triggers them. A subscriber can therefore never be added to a topic that
/// is concurrently being discarded.
#[derive(Debug, Default)]
pub struct Registry {
    /// Topics indexed by name.
    topics: DashMap<String, Arc<Topic>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            topic_count: self.topics.len(),
            total_subscriptions: self.topics.iter().map(|t| t.subscriber_count()).sum(),
        }
    }

    fn entry_or_create(&self, topic_name: &str) -> RefMut<'_, String, Arc<Topic>> {
        self.topics
            .entry(topic_name.to_string())
            .or_insert_with(|| {
                debug!(topic = %topic_name, "Creating new topic");
                Arc::new(Topic::new(topic_name))
            })
    }

    /// Get the topic with this name, creating it if it does not exist.
    ///
    /// The returned handle is detached from the registry's lock: once the
    /// topic empties it may be deleted while the handle is still held. Use it
    /// for reads and broadcasts only. Membership changes must go through
    /// [`Registry::subscribe`] and [`Registry::unsubscribe`].
    #[must_use]
    pub fn resolve_or_create(&self, topic_name: &str) -> Arc<Topic> {
        Arc::clone(self.entry_or_create(topic_name).value())
    }

    /// Subscribe a connection to a topic, creating the topic if needed.
    pub fn subscribe(&self, topic_name: &str, connection_id: ConnectionId, sink: SharedSink) {
        let entry = self.entry_or_create(topic_name);
        entry.add_subscriber(connection_id, sink);

        debug!(
            topic = %topic_name,
            subscribers = entry.subscriber_count(),
            "Subscribed"
        );
    }

    /// Unsubscribe a connection from a topic.
    ///
    /// Deletes the topic if it is left empty. Returns `true` if the
    /// connection was a member.
    pub fn unsubscribe(&self, topic_name: &str, connection_id: &ConnectionId) -> bool {
        let Entry::Occupied(entry) = self.topics.entry(topic_name.to_string()) else {
            trace!(topic = %topic_name, connection = %connection_id, "Unsubscribe from unknown topic");
            return false;
        };

        let removed = entry.get().remove_subscriber(connection_id);
        if entry.get().is_empty() {
            entry.remove();
            debug!(topic = %topic_name, "Deleted empty topic");
        }

        removed
    }

    /// Broadcast a message to a topic on behalf of one of its members.
    ///
    /// Nothing is sent if the topic does not exist, has no members, or
    /// `from` is not a member. The sender is part of the membership and so
    /// receives its own message.
    pub async fn send(
        &self,
        topic_name: &str,
        message: &str,
        from: &ConnectionId,
    ) -> Option<BroadcastReport> {
        let Some(topic) = self.topic(topic_name) else {
            trace!(topic = %topic_name, connection = %from, "Broadcast to unknown topic");
            return None;
        };

        if topic.is_empty() || !topic.contains(from) {
            debug!(topic = %topic_name, connection = %from, "Ignoring broadcast from non-member");
            return None;
        }

        let report = topic.broadcast(encode_delivery(message)).await;
        trace!(
            topic = %topic_name,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );
        Some(report)
    }

    /// Apply a decoded event on behalf of a connection.
    ///
    /// Returns the delivery report when the event was a broadcast that
    /// actually went out.
    pub async fn dispatch(
        &self,
        event: Event,
        from: &ConnectionId,
        sink: &SharedSink,
    ) -> Option<BroadcastReport> {
        match event {
            Event::Subscribe { topic } => {
                self.subscribe(&topic, from.clone(), Arc::clone(sink));
                None
            }
            Event::Unsubscribe { topic } => {
                self.unsubscribe(&topic, from);
                None
            }
            Event::Broadcast { topic, message } => self.send(&topic, &message, from).await,
        }
    }

    /// Remove a connection from every topic.
    ///
    /// Safe to call for connections that never subscribed or were already
    /// removed. Returns the number of topics the connection was removed from.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> usize {
        let removed = self
            .topic_names()
            .iter()
            .filter(|name| self.unsubscribe(name, connection_id))
            .count();

        debug!(connection = %connection_id, topics = removed, "Unsubscribed from all topics");
        removed
    }

    /// Get a topic by name without creating it.
    #[must_use]
    pub fn topic(&self, topic_name: &str) -> Option<Arc<Topic>> {
        self.topics.get(topic_name).map(|t| Arc::clone(t.value()))
    }

    /// Check if a topic exists.
    #[must_use]
    pub fn topic_exists(&self, topic_name: &str) -> bool {
        self.topics.contains_key(topic_name)
    }

    /// Check if a connection is subscribed to a topic.
    #[must_use]
    pub fn contains(&self, topic_name: &str, connection_id: &ConnectionId) -> bool {
        self.topics
            .get(topic_name)
            .is_some_and(|t| t.contains(connection_id))
    }

    /// Get the subscriber count for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic_name: &str) -> usize {
        self.topics
            .get(topic_name)
            .map(|t| t.subscriber_count())
            .unwrap_or(0)
    }

    /// Get all topic names.
    #[must_use]
    pub fn topic_names(&self) -> Vec<String> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of live topics.
    pub topic_count: usize,
    /// Total number of subscriptions across all topics.
    pub total_subscriptions: usize,
}
