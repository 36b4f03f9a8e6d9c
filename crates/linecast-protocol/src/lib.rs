//! # linecast-protocol
//!
//! Wire protocol definitions for the linecast message relay.
//!
//! Clients send one JSON envelope per line. The envelope header carries a
//! numeric type tag and the payload shape depends on it:
//!
//! - `0` Subscribe / `1` Unsubscribe - payload is the topic name
//! - `2` Broadcast - payload is `{ "channel": .., "message": .. }`
//!
//! The server answers only with delivered broadcast messages, one raw line
//! each.
//!
//! ## Example
//!
//! ```rust
//! use linecast_protocol::{codec, Event};
//!
//! let line = codec::encode_event(&Event::broadcast("news", "hello")).unwrap();
//! let decoded = codec::decode_line(&line).unwrap();
//! assert_eq!(decoded, Event::broadcast("news", "hello"));
//! ```

pub mod codec;
pub mod envelope;

pub use codec::{decode_line, encode_delivery, encode_event, sanitize, LineCodec, ProtocolError};
pub use envelope::{BroadcastPayload, Envelope, Event, EventType, Header, Payload};
