//! Per-connection frame reader: pulls bytes, decodes frames, stamps the
//! author, and converts read failure into one final synthetic message.

use std::collections::VecDeque;

use courier_transport::StreamReader;
use courier_wire::{FrameDecoder, Message};

use crate::DISCONNECT;

/// Yields the messages of one connection in arrival order.
///
/// On end of stream or read error, [`next`](Self::next) yields a single
/// synthetic message named [`DISCONNECT`] (no id, no body, author stamped)
/// so that dispatch logic observes disconnection like any other message,
/// then `None` forever.
pub(crate) struct FrameReader {
    author: String,
    reader: StreamReader,
    decoder: FrameDecoder,
    pending: VecDeque<Message>,
    disconnected: bool,
}

impl FrameReader {
    pub(crate) fn new(author: impl Into<String>, reader: StreamReader) -> Self {
        Self {
            author: author.into(),
            reader,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            disconnected: false,
        }
    }

    pub(crate) async fn next(&mut self) -> Option<Message> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Some(msg);
            }
            if self.disconnected {
                return None;
            }

            let mut chunk = [0u8; 1024];
            match self.reader.read(&mut chunk).await {
                Ok(0) | Err(_) => {
                    self.disconnected = true;
                    return Some(synthetic_disconnect(&self.author));
                }
                Ok(n) => {
                    for mut msg in self.decoder.feed(&chunk[..n]) {
                        msg.author = self.author.clone();
                        self.pending.push_back(msg);
                    }
                }
            }
        }
    }
}

/// The message delivered when a connection's stream fails or closes.
pub(crate) fn synthetic_disconnect(author: &str) -> Message {
    Message {
        author: author.to_string(),
        name: DISCONNECT.to_string(),
        ..Message::default()
    }
}
