//! Shared fixtures for the linecast benchmarks.

use bytes::Bytes;
use linecast_core::{ChannelSink, ConnectionId, Registry};
use tokio::sync::mpsc::UnboundedReceiver;

/// Build a registry with `subscribers` members on `topic`.
///
/// The receivers are returned so deliveries stay successful for the
/// lifetime of the benchmark.
pub fn populated_registry(topic: &str, subscribers: usize) -> (Registry, Vec<UnboundedReceiver<Bytes>>) {
    let registry = Registry::new();
    let receivers = (0..subscribers)
        .map(|i| {
            let (sink, rx) = ChannelSink::shared();
            registry.subscribe(topic, ConnectionId::new(format!("conn-{}", i)), sink);
            rx
        })
        .collect();
    (registry, receivers)
}

/// Drop everything already delivered to the receivers.
pub fn drain(receivers: &mut [UnboundedReceiver<Bytes>]) {
    for rx in receivers {
        while rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populated_registry() {
        let (registry, receivers) = populated_registry("bench", 5);
        assert_eq!(registry.subscriber_count("bench"), 5);
        assert_eq!(receivers.len(), 5);
    }
}
