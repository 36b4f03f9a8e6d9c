//! Connection identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter backing generated IDs.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a live connection.
///
/// Generated IDs embed a counter that never repeats within a process, so an
/// ID is never reused while the connection it names is still registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a connection ID from an explicit value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID tagged with the peer address.
    #[must_use]
    pub fn for_peer(peer: impl fmt::Display) -> Self {
        Self(format!("{}#{:x}", peer, next_id()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_peer_gets_distinct_ids() {
        let id1 = ConnectionId::for_peer("127.0.0.1:5000");
        let id2 = ConnectionId::for_peer("127.0.0.1:5000");
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("127.0.0.1:5000#"));
    }

    #[test]
    fn test_connection_id_from_string() {
        let id: ConnectionId = "test-id".into();
        assert_eq!(id.as_str(), "test-id");
        assert_eq!(id.to_string(), "test-id");
    }
}
