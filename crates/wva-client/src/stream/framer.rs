//! Message framing for the event stream
//!
//! The device writes JSON objects back to back, usually separated by
//! `\r\n`, with no length prefix. Boundaries are found by decoding: bytes
//! before the next `{` are noise, and a document ends where the decoder
//! stops.

use serde_json::{Map, Value};
use tracing::{trace, warn};

use super::types::StreamEvent;

/// Result of one framing attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Framed {
    /// A complete document was removed from the front of the buffer
    Event(StreamEvent),
    /// The buffer holds no complete document yet
    NeedMoreData,
}

enum Attempt {
    Decoded(Map<String, Value>, usize),
    Incomplete,
    Malformed(serde_json::Error),
}

/// Extract at most one event from the front of `buf`
///
/// Leading noise is dropped. An incomplete trailing document is left in
/// place unless it has grown past `max_len`, in which case it is
/// discarded. A `{` that can never begin a valid document is skipped and
/// framing resumes at the next `{`. That next `{` may sit inside the
/// corrupt document, so a nested object of a damaged event can come out
/// as an event of its own.
///
/// Call repeatedly until [`Framed::NeedMoreData`]: one read may carry
/// several documents.
pub fn next_event(buf: &mut Vec<u8>, max_len: usize) -> Framed {
    loop {
        match buf.iter().position(|&b| b == b'{') {
            None => {
                buf.clear();
                return Framed::NeedMoreData;
            }
            Some(0) => {}
            Some(start) => {
                trace!(bytes = start, "Skipping inter-message noise");
                buf.drain(..start);
            }
        }

        let attempt = {
            let mut docs =
                serde_json::Deserializer::from_slice(&buf[..]).into_iter::<Map<String, Value>>();
            match docs.next() {
                Some(Ok(values)) => Attempt::Decoded(values, docs.byte_offset()),
                Some(Err(e)) if e.is_eof() => Attempt::Incomplete,
                Some(Err(e)) => Attempt::Malformed(e),
                None => Attempt::Incomplete,
            }
        };

        match attempt {
            Attempt::Decoded(values, consumed) => {
                buf.drain(..consumed);
                return Framed::Event(values.into());
            }
            Attempt::Incomplete => {
                if buf.len() > max_len {
                    warn!(
                        buffered = buf.len(),
                        max_len, "Discarding oversized partial event"
                    );
                    buf.clear();
                }
                return Framed::NeedMoreData;
            }
            Attempt::Malformed(e) => {
                warn!(error = %e, "Discarding malformed event data");
                buf.drain(..1);
            }
        }
    }
}
