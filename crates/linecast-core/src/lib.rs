//! # linecast-core
//!
//! Subscription registry and fan-out engine for the linecast relay.
//!
//! - **Topic** - named group of connections with a fan-out broadcast
//! - **Registry** - owns all topics, creates and deletes them, routes events
//! - **MessageSink** - per-connection write handle used for delivery
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  Event   ┌─────────────┐          ┌─────────────┐
//! │  Connection │─────────▶│  Registry   │─────────▶│    Topic    │
//! └─────────────┘          └─────────────┘          └─────────────┘
//!        ▲                                                 │
//!        └──────────────── MessageSink::deliver ◀──────────┘
//! ```

pub mod connection;
pub mod registry;
pub mod sink;
pub mod topic;

pub use connection::ConnectionId;
pub use registry::{Registry, RegistryStats};
pub use sink::{ChannelSink, DeliveryError, MessageSink, SharedSink};
pub use topic::{BroadcastReport, Topic};
