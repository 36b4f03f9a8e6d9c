//! Delivery handles for subscribers.
//!
//! A topic stores one [`MessageSink`] per subscriber and writes broadcast
//! payloads through it. Transports implement the trait for their write half.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Delivery errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The receiving side is gone.
    #[error("Sink closed")]
    Closed,

    /// Writing to the underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A handle that can write bytes to one connection.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Write a fully framed payload to the connection.
    async fn deliver(&self, payload: Bytes) -> Result<(), DeliveryError>;
}

/// Shared sink handle stored in a topic's subscriber set.
pub type SharedSink = Arc<dyn MessageSink>;

/// A sink that forwards payloads into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes its deliveries.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a sink wrapped as a [`SharedSink`].
    #[must_use]
    pub fn shared() -> (SharedSink, mpsc::UnboundedReceiver<Bytes>) {
        let (sink, rx) = Self::new();
        (Arc::new(sink), rx)
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.tx.send(payload).map_err(|_| DeliveryError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.deliver(Bytes::from_static(b"hi\n")).await.unwrap();
        assert_eq!(&rx.recv().await.unwrap()[..], b"hi\n");
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(
            sink.deliver(Bytes::from_static(b"x")).await,
            Err(DeliveryError::Closed)
        ));
    }
}
