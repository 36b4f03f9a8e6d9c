//! Connection handlers for the linecast server.
//!
//! One supervisor task runs per accepted connection. It reads decoded events,
//! spawns a task per event to apply it to the registry, and on the way out
//! closes the transport, waits for those tasks, and removes the connection
//! from every topic.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use linecast_core::{ConnectionId, Registry, SharedSink};
use linecast_protocol::Event;
use linecast_transport::{Connection, TcpTransport, Transport};
use std::fmt;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Reading,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Open => "open",
            SessionState::Reading => "reading",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What happened over the lifetime of one connection.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub connection_id: ConnectionId,
    pub state: SessionState,
    /// Events handed to the registry.
    pub dispatched: usize,
    /// Lines rejected as malformed.
    pub rejected: usize,
    /// Topics the connection was still a member of at disconnect.
    pub topics_left: usize,
}

impl SessionSummary {
    fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            state: SessionState::Open,
            dispatched: 0,
            rejected: 0,
            topics_left: 0,
        }
    }

    fn transition(&mut self, next: SessionState) {
        trace!(connection = %self.connection_id, from = %self.state, to = %next, "Session state");
        self.state = next;
    }
}

/// Run the TCP server until the process exits.
///
/// # Errors
///
/// Returns an error if the listening socket cannot be bound.
pub async fn run_server(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let tcp_config = config.tcp_config()?;
    let addr = tcp_config.bind_addr;
    let transport = TcpTransport::new(tcp_config)
        .await
        .with_context(|| format!("Failed to listen on {}", addr))?;

    info!("linecast server listening on {}", addr);

    let registry = Arc::new(Registry::new());
    serve(transport, registry).await;

    Ok(())
}

/// Accept connections forever, supervising each on its own task.
pub async fn serve(transport: impl Transport, registry: Arc<Registry>) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                let peer = conn.remote_addr().unwrap_or_else(|| "unknown".to_string());
                info!(connection = %conn.id(), peer = %peer, "Client connected");
                tokio::spawn(supervise(conn, Arc::clone(&registry)));
            }
            Err(e) => {
                warn!(transport = transport.name(), error = %e, "Error accepting connection");
            }
        }
    }
}

/// Drive one connection from accept to cleanup.
///
/// Malformed lines are logged and skipped. Any other read outcome (end of
/// stream or transport error) ends the loop. The connection is then closed,
/// every event task it spawned is awaited, and only then is the connection
/// removed from every topic, so no late subscribe can outlive the cleanup.
/// Both steps run exactly once.
pub async fn supervise(mut conn: Box<dyn Connection>, registry: Arc<Registry>) -> SessionSummary {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = conn.id().clone();
    let sink = conn.sink();
    let mut session = SessionSummary::new(connection_id.clone());
    let mut in_flight = JoinSet::new();

    session.transition(SessionState::Reading);
    loop {
        while let Some(done) = in_flight.try_join_next() {
            log_dispatch_failure(&connection_id, done);
        }

        match conn.recv().await {
            Ok(Some(event)) => {
                trace!(
                    connection = %connection_id,
                    kind = %event.event_type(),
                    topic = event.topic(),
                    "Received"
                );
                metrics::record_event(event.event_type());
                session.dispatched += 1;
                in_flight.spawn(dispatch(
                    Arc::clone(&registry),
                    event,
                    connection_id.clone(),
                    Arc::clone(&sink),
                ));
            }
            Ok(None) => {
                debug!(connection = %connection_id, "Stream ended");
                break;
            }
            Err(e) if e.is_recoverable() => {
                warn!(connection = %connection_id, error = %e, "Rejected malformed message");
                metrics::record_decode_error();
                session.rejected += 1;
            }
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "Connection read failed");
                break;
            }
        }
    }

    session.transition(SessionState::Closing);
    if let Err(e) = conn.close().await {
        debug!(connection = %connection_id, error = %e, "Error closing connection");
    }
    while let Some(done) = in_flight.join_next().await {
        log_dispatch_failure(&connection_id, done);
    }
    session.topics_left = registry.disconnect(&connection_id);
    metrics::set_active_topics(registry.stats().topic_count);
    session.transition(SessionState::Closed);

    info!(
        connection = %connection_id,
        dispatched = session.dispatched,
        rejected = session.rejected,
        topics = session.topics_left,
        "Client disconnected"
    );

    session
}

/// Apply one event to the registry.
async fn dispatch(registry: Arc<Registry>, event: Event, from: ConnectionId, sink: SharedSink) {
    if let Some(report) = registry.dispatch(event, &from, &sink).await {
        metrics::record_broadcast(&report);
    }
    metrics::set_active_topics(registry.stats().topic_count);
}

fn log_dispatch_failure(connection_id: &ConnectionId, done: Result<(), JoinError>) {
    if let Err(e) = done {
        error!(connection = %connection_id, error = %e, "Event task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use linecast_core::ChannelSink;
    use linecast_protocol::codec;
    use linecast_transport::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    /// In-memory connection fed from a channel.
    struct MockConnection {
        id: ConnectionId,
        inbound: mpsc::UnboundedReceiver<Result<Event, TransportError>>,
        sink: SharedSink,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for MockConnection {
        fn id(&self) -> &ConnectionId {
            &self.id
        }

        async fn recv(&mut self) -> Result<Option<Event>, TransportError> {
            match self.inbound.recv().await {
                Some(Ok(event)) => Ok(Some(event)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        }

        fn sink(&self) -> SharedSink {
            Arc::clone(&self.sink)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.closes.load(Ordering::SeqCst) == 0
        }
    }

    fn mock(
        id: &str,
    ) -> (
        Box<dyn Connection>,
        mpsc::UnboundedSender<Result<Event, TransportError>>,
        Arc<AtomicUsize>,
    ) {
        let (tx, inbound) = mpsc::unbounded_channel();
        let (sink, _) = ChannelSink::shared();
        let closes = Arc::new(AtomicUsize::new(0));
        let conn = MockConnection {
            id: ConnectionId::new(id),
            inbound,
            sink,
            closes: Arc::clone(&closes),
        };
        (Box::new(conn), tx, closes)
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_malformed_input_keeps_session_open() {
        let registry = Arc::new(Registry::new());
        let (conn, tx, closes) = mock("c1");
        let handle = tokio::spawn(supervise(conn, Arc::clone(&registry)));

        let malformed = codec::decode_line(b"{not json").unwrap_err();
        tx.send(Err(malformed.into())).unwrap();
        tx.send(Ok(Event::subscribe("a"))).unwrap();
        tx.send(Ok(Event::subscribe("b"))).unwrap();

        let id = ConnectionId::new("c1");
        eventually(|| registry.contains("a", &id) && registry.contains("b", &id)).await;
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        drop(tx);
        let summary = handle.await.unwrap();
        assert_eq!(summary.state, SessionState::Closed);
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.topics_left, 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!registry.topic_exists("a"));
        assert!(!registry.topic_exists("b"));
    }

    #[tokio::test]
    async fn test_read_failure_triggers_cleanup() {
        let registry = Arc::new(Registry::new());
        let (other_sink, _rx) = ChannelSink::shared();
        registry.subscribe("shared", ConnectionId::new("other"), other_sink);

        let (conn, tx, closes) = mock("c1");
        let handle = tokio::spawn(supervise(conn, Arc::clone(&registry)));

        tx.send(Ok(Event::subscribe("shared"))).unwrap();
        let id = ConnectionId::new("c1");
        eventually(|| registry.contains("shared", &id)).await;

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        tx.send(Err(reset.into())).unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary.state, SessionState::Closed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!registry.contains("shared", &id));
        assert_eq!(registry.subscriber_count("shared"), 1);
    }

    #[tokio::test]
    async fn test_subscribe_before_eof_is_cleaned_up() {
        let registry = Arc::new(Registry::new());
        let (conn, tx, closes) = mock("c1");

        tx.send(Ok(Event::subscribe("late"))).unwrap();
        drop(tx);

        let summary = supervise(conn, Arc::clone(&registry)).await;
        assert_eq!(summary.state, SessionState::Closed);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.topics_left, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        // Nothing is left behind, even after other tasks get to run.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!registry.contains("late", &ConnectionId::new("c1")));
        assert!(!registry.topic_exists("late"));
        assert_eq!(
            registry.stats(),
            linecast_core::RegistryStats {
                topic_count: 0,
                total_subscriptions: 0
            }
        );
    }

    #[tokio::test]
    async fn test_end_to_end_over_tcp() {
        let transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();
        let registry = Arc::new(Registry::new());
        tokio::spawn(serve(transport, Arc::clone(&registry)));

        let (r1, mut w1) = TcpStream::connect(addr).await.unwrap().into_split();
        let (r2, mut w2) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines1 = BufReader::new(r1).lines();
        let mut lines2 = BufReader::new(r2).lines();

        let subscribe = codec::encode_event(&Event::subscribe("news")).unwrap();
        w1.write_all(&subscribe).await.unwrap();
        w2.write_all(&subscribe).await.unwrap();
        eventually(|| registry.subscriber_count("news") == 2).await;

        let broadcast = codec::encode_event(&Event::broadcast("news", "hi")).unwrap();
        w1.write_all(&broadcast).await.unwrap();

        assert_eq!(lines2.next_line().await.unwrap().as_deref(), Some("hi"));
        assert_eq!(lines1.next_line().await.unwrap().as_deref(), Some("hi"));

        // Disconnecting the first client removes it from the topic.
        drop(w1);
        drop(lines1);
        eventually(|| registry.subscriber_count("news") == 1).await;

        let unsubscribe = codec::encode_event(&Event::unsubscribe("news")).unwrap();
        w2.write_all(&unsubscribe).await.unwrap();
        eventually(|| !registry.topic_exists("news")).await;
    }
}
