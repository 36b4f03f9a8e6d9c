//! Transport abstraction traits for linecast.
//!
//! The connection supervisor only talks to these traits, so it can be driven
//! by the TCP transport in production and by in-memory connections in tests.

use async_trait::async_trait;
use linecast_core::{ConnectionId, SharedSink};
use linecast_protocol::{Event, ProtocolError};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A single inbound line could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the connection can keep reading after this error.
    ///
    /// Only malformed input is recoverable; everything else ends the session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Protocol(_))
    }
}

/// A transport that can accept connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Accept a new connection.
    ///
    /// This method blocks until a new connection is available or an error occurs.
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError>;

    /// Get the transport name (e.g., "tcp").
    fn name(&self) -> &'static str;
}

/// An active connection over a transport.
///
/// Inbound traffic is read through [`Connection::recv`]; outbound traffic goes
/// through the connection's [`SharedSink`], which topics hold on to.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection's unique identifier.
    fn id(&self) -> &ConnectionId;

    /// Receive the next event from the connection.
    ///
    /// Returns `None` if the peer closed the stream. A recoverable error
    /// (see [`TransportError::is_recoverable`]) leaves the connection usable.
    async fn recv(&mut self) -> Result<Option<Event>, TransportError>;

    /// Get the write handle for this connection.
    fn sink(&self) -> SharedSink;

    /// Close the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }

    /// Check if the connection is still open.
    fn is_open(&self) -> bool;
}
