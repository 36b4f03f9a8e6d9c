//! # linecast-transport
//!
//! Transport layer for the linecast relay.
//!
//! The server accepts [`Connection`]s from a [`Transport`], reads decoded
//! events from them and hands their sinks to the registry. The only shipped
//! transport is newline-delimited TCP.
//!
//! ```rust,ignore
//! use linecast_transport::{Connection, TcpTransport, Transport};
//!
//! async fn handle_connection(mut conn: Box<dyn Connection>) {
//!     while let Ok(Some(event)) = conn.recv().await {
//!         // Process event
//!     }
//! }
//! ```

pub mod tcp;
pub mod traits;

pub use tcp::{TcpConfig, TcpConnection, TcpSink, TcpTransport};
pub use traits::{Connection, Transport, TransportError};
