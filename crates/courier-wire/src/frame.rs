//! Binary frame codec: encoding one message to bytes and incrementally
//! decoding a byte stream back into messages.
//!
//! Frame layout (all integers big-endian, no padding):
//!
//! ```text
//! offset 0..12    12-byte message id
//! offset 12       1 byte meta flags
//! offset 13       1 byte name length N (0..=255)
//! offset 14..14+N N bytes name (UTF-8)
//! -- only when the HAS_BODY flag is set --
//! offset 14+N     8-byte body length L
//! offset 14+N+8   L bytes body
//! ```
//!
//! A frame without `HAS_BODY` ends immediately after the name; no
//! body-length field is present.

use crate::{Message, MessageId, Meta, WireError};

/// Maximum encodable name length in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Fixed prefix: id + meta + name length.
const HEADER_LEN: usize = MessageId::LEN + 2;
/// Size of the body-length field.
const BODY_LEN_FIELD: usize = 8;

/// Encodes one frame.
///
/// The body-length field and body are written whenever `body` is non-empty,
/// independent of the `HAS_BODY` bit in `meta`; callers keep the flag
/// consistent with the body they pass. The receiving decoder trusts the
/// flag, so an inconsistent pair desynchronizes the stream.
///
/// # Errors
/// Returns [`WireError::NameTooLong`] if `name` exceeds 255 bytes.
pub fn encode(
    id: MessageId,
    meta: Meta,
    name: &str,
    body: &[u8],
) -> Result<Vec<u8>, WireError> {
    if name.len() > MAX_NAME_LEN {
        return Err(WireError::NameTooLong { len: name.len() });
    }

    let mut frame = Vec::with_capacity(
        HEADER_LEN + name.len() + BODY_LEN_FIELD + body.len(),
    );
    frame.extend_from_slice(id.as_bytes());
    frame.push(meta.bits());
    frame.push(name.len() as u8);
    frame.extend_from_slice(name.as_bytes());
    if !body.is_empty() {
        frame.extend_from_slice(&(body.len() as u64).to_be_bytes());
        frame.extend_from_slice(body);
    }
    Ok(frame)
}

/// Incremental frame decoder for one connection.
///
/// Fed byte chunks of arbitrary size via [`feed`](Self::feed), it
/// accumulates them and emits every frame that becomes complete, in input
/// order — a frame may span many chunks, and one chunk may complete many
/// frames. The decoder holds no state besides the unconsumed buffer, so a
/// fresh instance per connection restarts parsing cleanly.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns all frames completed by it.
    ///
    /// Emitted messages carry an empty `author`; the reader loop stamps the
    /// connection's identity afterwards.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Message> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some((msg, consumed)) = parse_frame(&self.buf) {
            out.push(msg);
            self.buf.drain(..consumed);
        }
        out
    }
}

/// Parses one complete frame from the front of `buf`, returning the message
/// and the number of bytes it occupied, or `None` while bytes are missing.
fn parse_frame(buf: &[u8]) -> Option<(Message, usize)> {
    if buf.len() < HEADER_LEN {
        return None;
    }

    let mut id = [0u8; MessageId::LEN];
    id.copy_from_slice(&buf[..MessageId::LEN]);
    let meta = Meta::from_bits(buf[MessageId::LEN]);
    let name_len = buf[MessageId::LEN + 1] as usize;

    let name_end = HEADER_LEN + name_len;
    if buf.len() < name_end {
        return None;
    }

    let (body, frame_end) = if meta.has_body() {
        let body_start = name_end + BODY_LEN_FIELD;
        if buf.len() < body_start {
            return None;
        }
        let mut len_bytes = [0u8; BODY_LEN_FIELD];
        len_bytes.copy_from_slice(&buf[name_end..body_start]);
        let body_len = u64::from_be_bytes(len_bytes) as usize;

        let body_end = body_start + body_len;
        if buf.len() < body_end {
            return None;
        }
        (buf[body_start..body_end].to_vec(), body_end)
    } else {
        (Vec::new(), name_end)
    };

    let msg = Message {
        id: MessageId::from_bytes(id),
        author: String::new(),
        meta,
        name: String::from_utf8_lossy(&buf[HEADER_LEN..name_end]).into_owned(),
        body,
    };
    Some((msg, frame_end))
}
