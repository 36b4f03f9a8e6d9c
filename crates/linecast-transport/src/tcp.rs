//! TCP transport implementation.
//!
//! Each accepted stream is split: the read half feeds a [`LineCodec`] and the
//! write half is wrapped in a [`TcpSink`] that topics deliver through.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use linecast_core::{ConnectionId, DeliveryError, MessageSink, SharedSink};
use linecast_protocol::codec::DEFAULT_MAX_LINE_LENGTH;
use linecast_protocol::{Event, LineCodec};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::traits::{Connection, Transport, TransportError};

/// Initial read buffer capacity.
const READ_BUFFER_CAPACITY: usize = 4096;

/// TCP transport configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum inbound line length in bytes.
    pub max_line_length: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1102)),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// TCP transport.
pub struct TcpTransport {
    listener: TcpListener,
    config: TcpConfig,
}

impl TcpTransport {
    /// Create a new TCP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn new(config: TcpConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr).await?;

        info!("TCP transport listening on {}", config.bind_addr);

        Ok(Self { listener, config })
    }

    /// Create a new TCP transport with default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        Self::new(TcpConfig {
            bind_addr: addr,
            ..Default::default()
        })
        .await
    }

    /// Get the local address this transport is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, addr) = self.listener.accept().await?;

        debug!("Accepted TCP connection from {}", addr);

        let conn = TcpConnection::new(stream, addr, self.config.max_line_length);
        Ok(Box::new(conn))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// Write half of a TCP connection.
///
/// Closing wakes any delivery still waiting on the socket, so shutdown never
/// waits behind a peer that stopped reading.
pub struct TcpSink {
    writer: Mutex<OwnedWriteHalf>,
    is_open: AtomicBool,
    closed: Notify,
}

impl TcpSink {
    fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            writer: Mutex::new(writer),
            is_open: AtomicBool::new(true),
            closed: Notify::new(),
        }
    }

    /// Check if the write half is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> std::io::Result<()> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(()); // Already closed
        }
        self.closed.notify_waiters();

        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

#[async_trait]
impl MessageSink for TcpSink {
    async fn deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        let closed = self.closed.notified();
        tokio::pin!(closed);
        // Register before checking the flag so a concurrent shutdown is seen.
        closed.as_mut().enable();

        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }

        tokio::select! {
            written = async {
                let mut writer = self.writer.lock().await;
                writer.write_all(&payload).await
            } => {
                written?;
                Ok(())
            }
            () = &mut closed => Err(DeliveryError::Closed),
        }
    }
}

/// A TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    reader: OwnedReadHalf,
    sink: Arc<TcpSink>,
    remote_addr: SocketAddr,
    read_buffer: BytesMut,
    codec: LineCodec,
    eof: bool,
}

impl TcpConnection {
    /// Wrap an accepted stream.
    #[must_use]
    pub fn new(stream: TcpStream, remote_addr: SocketAddr, max_line_length: usize) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            id: ConnectionId::for_peer(remote_addr),
            reader,
            sink: Arc::new(TcpSink::new(writer)),
            remote_addr,
            read_buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            codec: LineCodec::new(max_line_length),
            eof: false,
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Event>, TransportError> {
        if self.eof {
            return Err(TransportError::ConnectionClosed);
        }

        loop {
            // First, try to decode from the existing buffer
            if let Some(event) = self.codec.decode_from(&mut self.read_buffer)? {
                return Ok(Some(event));
            }

            // Need more data
            let read = self.reader.read_buf(&mut self.read_buffer).await?;
            if read == 0 {
                if !self.read_buffer.is_empty() {
                    debug!(
                        connection = %self.id,
                        bytes = self.read_buffer.len(),
                        "Discarding unterminated line at end of stream"
                    );
                }
                self.eof = true;
                return Ok(None);
            }
        }
    }

    fn sink(&self) -> SharedSink {
        Arc::clone(&self.sink) as SharedSink
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.eof = true;
        self.sink.shutdown().await?;
        Ok(())
    }

    fn remote_addr(&self) -> Option<String> {
        Some(self.remote_addr.to_string())
    }

    fn is_open(&self) -> bool {
        !self.eof && self.sink.is_open()
    }
}
