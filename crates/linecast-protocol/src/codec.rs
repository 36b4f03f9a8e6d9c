//! Codec for encoding and decoding linecast lines.
//!
//! Inbound: one JSON [`Event`] envelope per `\n`-terminated line.
//! Outbound: raw message text followed by a single `\n`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::envelope::{Event, EventType};

/// Default maximum inbound line length (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Line delimiter.
pub const DELIMITER: u8 = b'\n';

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Line exceeds maximum length.
    #[error("Line length {0} exceeds maximum {1}")]
    LineTooLong(usize, usize),

    /// The envelope is not valid JSON or has the wrong structure.
    #[error("Malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload shape does not match the header's type tag.
    #[error("Payload does not match {0} event")]
    PayloadMismatch(EventType),
}

/// Decode a single line (without its delimiter) into an event.
///
/// Surrounding whitespace, including a trailing `\r`, is ignored.
///
/// # Errors
///
/// Returns an error if the line is not a well-formed envelope.
pub fn decode_line(line: &[u8]) -> Result<Event, ProtocolError> {
    let event = serde_json::from_slice(line.trim_ascii())?;
    Ok(event)
}

/// Encode an event as an envelope line, delimiter included.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_event(event: &Event) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    encode_event_into(event, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode an event line into an existing buffer.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_event_into(event: &Event, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let json = serde_json::to_vec(event)?;
    buf.reserve(json.len() + 1);
    buf.extend_from_slice(&json);
    buf.put_u8(DELIMITER);
    Ok(())
}

/// Encode a message for delivery to a subscriber.
#[must_use]
pub fn encode_delivery(message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(message.len() + 1);
    buf.extend_from_slice(message.as_bytes());
    buf.put_u8(DELIMITER);
    buf.freeze()
}

/// Strip embedded line breaks so a value fits on one line.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value.replace(['\n', '\r'], "")
}

/// Streaming line decoder.
///
/// Splits a read buffer on `\n` and decodes each line. Blank lines are
/// skipped. A line longer than the configured maximum is reported once and
/// the remainder of it is discarded up to the next delimiter.
#[derive(Debug)]
pub struct LineCodec {
    max_length: usize,
    discarding: bool,
    /// Bytes of the buffer already searched for a delimiter.
    next_index: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineCodec {
    /// Create a codec with the given maximum line length.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
            next_index: 0,
        }
    }

    /// Try to decode an event from a buffer, advancing it past consumed lines.
    ///
    /// Returns `Ok(Some(event))` if a complete line was decoded,
    /// `Ok(None)` if more data is needed, or `Err` if the next line is
    /// malformed. The codec stays usable after an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is too long or cannot be decoded.
    pub fn decode_from(&mut self, buf: &mut BytesMut) -> Result<Option<Event>, ProtocolError> {
        loop {
            let start = self.next_index.min(buf.len());
            let newline = buf[start..]
                .iter()
                .position(|b| *b == DELIMITER)
                .map(|offset| start + offset);

            if self.discarding {
                self.next_index = 0;
                match newline {
                    Some(pos) => {
                        buf.advance(pos + 1);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
            }

            let Some(pos) = newline else {
                if buf.len() > self.max_length {
                    let len = buf.len();
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Err(ProtocolError::LineTooLong(len, self.max_length));
                }
                self.next_index = buf.len();
                return Ok(None);
            };

            self.next_index = 0;
            let line = buf.split_to(pos + 1);
            if pos > self.max_length {
                return Err(ProtocolError::LineTooLong(pos, self.max_length));
            }

            let content = line[..pos].trim_ascii();
            if content.is_empty() {
                continue;
            }

            return decode_line(content).map(Some);
        }
    }
}
