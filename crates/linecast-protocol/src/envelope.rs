//! Envelope and event types for the linecast protocol.
//!
//! Every inbound line is a JSON envelope carrying a numeric type tag in its
//! header and a payload whose shape depends on that tag. Envelopes are only
//! the wire representation; the rest of the system works with [`Event`].

use serde::{Deserialize, Serialize};

use crate::codec::ProtocolError;

/// Event type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum EventType {
    Subscribe = 0,
    Unsubscribe = 1,
    Broadcast = 2,
}

impl From<EventType> for u8 {
    fn from(et: EventType) -> u8 {
        et as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Subscribe),
            1 => Ok(EventType::Unsubscribe),
            2 => Ok(EventType::Broadcast),
            _ => Err("Invalid event type"),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::Subscribe => "subscribe",
            EventType::Unsubscribe => "unsubscribe",
            EventType::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// Envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "type")]
    pub kind: EventType,
}

/// Payload of a broadcast envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastPayload {
    /// Target topic.
    pub channel: String,
    /// Message text delivered to every member.
    pub message: String,
}

/// Raw envelope payload, before it is checked against the header tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Topic name, carried by subscribe and unsubscribe.
    Topic(String),
    /// Channel and message, carried by broadcast.
    Broadcast(BroadcastPayload),
}

/// The wire envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub payload: Payload,
}

/// A decoded protocol event.
///
/// Serializes to and from its [`Envelope`] form, so a line on the wire can be
/// turned directly into an `Event` with `serde_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Envelope", try_from = "Envelope")]
pub enum Event {
    /// Join a topic, creating it if needed.
    Subscribe { topic: String },
    /// Leave a topic.
    Unsubscribe { topic: String },
    /// Send a message to every member of a topic.
    Broadcast { topic: String, message: String },
}

impl Event {
    /// Create a new Subscribe event.
    #[must_use]
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Event::Subscribe {
            topic: topic.into(),
        }
    }

    /// Create a new Unsubscribe event.
    #[must_use]
    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Event::Unsubscribe {
            topic: topic.into(),
        }
    }

    /// Create a new Broadcast event.
    #[must_use]
    pub fn broadcast(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Broadcast {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Get the event type.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Subscribe { .. } => EventType::Subscribe,
            Event::Unsubscribe { .. } => EventType::Unsubscribe,
            Event::Broadcast { .. } => EventType::Broadcast,
        }
    }

    /// Get the topic this event targets.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Event::Subscribe { topic }
            | Event::Unsubscribe { topic }
            | Event::Broadcast { topic, .. } => topic,
        }
    }
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        let kind = event.event_type();
        let payload = match event {
            Event::Subscribe { topic } | Event::Unsubscribe { topic } => Payload::Topic(topic),
            Event::Broadcast { topic, message } => Payload::Broadcast(BroadcastPayload {
                channel: topic,
                message,
            }),
        };
        Envelope {
            header: Header { kind },
            payload,
        }
    }
}

impl TryFrom<Envelope> for Event {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match (envelope.header.kind, envelope.payload) {
            (EventType::Subscribe, Payload::Topic(topic)) => Ok(Event::Subscribe { topic }),
            (EventType::Unsubscribe, Payload::Topic(topic)) => Ok(Event::Unsubscribe { topic }),
            (EventType::Broadcast, Payload::Broadcast(p)) => Ok(Event::Broadcast {
                topic: p.channel,
                message: p.message,
            }),
            (kind, _) => Err(ProtocolError::PayloadMismatch(kind)),
        }
    }
}
