//! Client session: one outbound connection, the handshake state machine,
//! and the send / request / subscribe operations.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use courier_transport::{dial, StreamWriter, TransportError};
use courier_wire::{encode, Message, MessageId, Meta};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{Mutex, Notify};

use crate::reader::{synthetic_disconnect, FrameReader};
use crate::rules::{lock, Rule, RuleTable};
use crate::{CourierError, Handler, HANDSHAKE};

/// A client session. Cheap to clone; all clones share one connection.
///
/// The session id is empty exactly while no handshake has completed —
/// before [`connect`](Self::connect), after [`disconnect`](Self::disconnect)
/// — and every send-side operation fails fast with
/// [`CourierError::NotConnected`] in that state.
#[derive(Clone, Default)]
pub struct Client {
    shared: Arc<ClientShared>,
}

#[derive(Default)]
struct ClientShared {
    /// Server-assigned identity; empty = not connected.
    id: StdMutex<String>,
    /// Write half, serialized across `send`, `request`, and the handshake.
    writer: Mutex<Option<StreamWriter>>,
    rules: RuleTable,
    /// Close signal for the current session's read loop. Replaced on every
    /// connect, so a disconnect of a dead session cannot carry a stale
    /// wakeup into the next one.
    closed: StdMutex<Arc<Notify>>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server-assigned session id, or the empty string while not
    /// connected.
    pub fn id(&self) -> String {
        lock(&self.shared.id).clone()
    }

    /// Connects to `address`, declaring `name` as this client's identity.
    ///
    /// Blocks until the handshake completes: a request-flagged
    /// `"handshake"` message carrying `name` is written, then frames are
    /// read synchronously — discarding everything else — until the server's
    /// `"handshake"` reply arrives with the assigned id as its body. Only
    /// then does the background read loop start feeding subscriptions.
    pub async fn connect(&self, address: &str, name: &str) -> Result<(), CourierError> {
        // Replace any previous session rather than leaking its read loop;
        // a failure tearing down a dead stream is irrelevant here.
        let _ = self.disconnect().await;

        let stream = dial(address).await?;
        let (reader, mut writer) = stream.into_split();

        let frame = encode(
            MessageId::generate(),
            Meta::request().with_body(!name.is_empty()),
            HANDSHAKE,
            name.as_bytes(),
        )?;
        writer.write_all(&frame).await?;
        *self.shared.writer.lock().await = Some(writer);

        let mut frames = FrameReader::new("", reader);
        let id = loop {
            match frames.next().await {
                Some(msg) if msg.name == HANDSHAKE => {
                    break String::from_utf8_lossy(&msg.body).into_owned();
                }
                // Anything else read during the handshake is dropped.
                Some(_) => continue,
                None => {
                    return Err(TransportError::ConnectionClosed(
                        "connection closed during handshake".into(),
                    )
                    .into());
                }
            }
        };
        tracing::info!(%id, %name, "connected");
        *lock(&self.shared.id) = id;

        let closed = Arc::new(Notify::new());
        *lock(&self.shared.closed) = Arc::clone(&closed);

        // The same reader carries over: frames partially buffered during
        // the handshake stay intact.
        let shared = Arc::clone(&self.shared);
        tokio::spawn(read_loop(shared, frames, closed));
        Ok(())
    }

    /// Fire-and-forget send.
    pub async fn send(&self, name: &str, body: &[u8]) -> Result<(), CourierError> {
        self.ensure_connected()?;
        let frame = encode(
            MessageId::generate(),
            Meta::default().with_body(!body.is_empty()),
            name,
            body,
        )?;
        self.write(&frame).await
    }

    /// Sends a request and returns the handle its reply is delivered on.
    ///
    /// A one-shot rule keyed on the request's id forwards the reply into
    /// the returned channel. There is no deadline: if the reply never
    /// arrives, the receiver waits forever — see
    /// [`request_timeout`](Self::request_timeout).
    pub async fn request(
        &self,
        name: &str,
        body: &[u8],
    ) -> Result<UnboundedReceiver<Message>, CourierError> {
        self.ensure_connected()?;

        let id = MessageId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        let forward = move |msg: &Message| -> Option<Vec<u8>> {
            let _ = tx.send(msg.clone());
            None
        };
        // Registered before the frame is written, so a fast reply cannot
        // slip past the table.
        self.shared
            .rules
            .push(Rule::new(Arc::new(forward)).once().for_id(id).for_name(name));

        let frame = encode(
            id,
            Meta::request().with_body(!body.is_empty()),
            name,
            body,
        )?;
        self.write(&frame).await?;
        Ok(rx)
    }

    /// [`request`](Self::request), but awaiting the reply with a deadline.
    pub async fn request_timeout(
        &self,
        name: &str,
        body: &[u8],
        deadline: Duration,
    ) -> Result<Message, CourierError> {
        let mut rx = self.request(name, body).await?;
        match tokio::time::timeout(deadline, rx.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(TransportError::ConnectionClosed(
                "reply channel closed".into(),
            )
            .into()),
            Err(_) => Err(CourierError::RequestTimeout),
        }
    }

    /// Subscribes `handler` to every message named `name`; the empty
    /// string subscribes to all messages. Handler return values are
    /// discarded on the client side.
    pub fn on(&self, name: &str, handler: impl Handler) {
        self.shared
            .rules
            .push(Rule::new(Arc::new(handler)).for_name(name));
    }

    /// Clears the session id, stops the read loop, and closes the stream.
    /// A no-op when already disconnected.
    pub async fn disconnect(&self) -> Result<(), CourierError> {
        lock(&self.shared.id).clear();
        // notify_one stores a permit, so the read loop sees the signal
        // even if it is mid-dispatch rather than parked on the select.
        lock(&self.shared.closed).notify_one();
        let mut writer = self.shared.writer.lock().await;
        if let Some(mut w) = writer.take() {
            w.shutdown().await?;
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), CourierError> {
        if lock(&self.shared.id).is_empty() {
            return Err(CourierError::NotConnected);
        }
        Ok(())
    }

    async fn write(&self, frame: &[u8]) -> Result<(), CourierError> {
        let mut writer = self.shared.writer.lock().await;
        match writer.as_mut() {
            Some(w) => Ok(w.write_all(frame).await?),
            None => Err(CourierError::NotConnected),
        }
    }
}

/// Drives the session's subscriptions for its remaining lifetime.
async fn read_loop(
    shared: Arc<ClientShared>,
    mut frames: FrameReader,
    closed: Arc<Notify>,
) {
    loop {
        tokio::select! {
            maybe = frames.next() => match maybe {
                Some(msg) => dispatch(&shared, msg),
                None => break,
            },
            _ = closed.notified() => {
                // Locally closed: deliver the disconnect message ourselves,
                // the stream may never produce another byte.
                dispatch(&shared, synthetic_disconnect(""));
                break;
            }
        }
    }
    tracing::debug!("client read loop ended");
}

/// Launches one detached task per matching rule.
fn dispatch(shared: &Arc<ClientShared>, msg: Message) {
    let handlers = shared.rules.matching(&msg, None);
    if handlers.is_empty() {
        return;
    }
    let msg = Arc::new(msg);
    for handler in handlers {
        let msg = Arc::clone(&msg);
        tokio::spawn(async move {
            let _ = handler.invoke(&msg);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_fails_fast() {
        let client = Client::new();
        let err = client.send("x", b"").await.expect_err("should fail");
        assert!(matches!(err, CourierError::NotConnected));
    }

    #[tokio::test]
    async fn test_request_before_connect_fails_fast() {
        let client = Client::new();
        let err = client.request("x", b"").await.err().expect("should fail");
        assert!(matches!(err, CourierError::NotConnected));
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_a_noop() {
        let client = Client::new();
        client.disconnect().await.expect("noop disconnect");
        assert!(client.id().is_empty());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_address_returns_dial_error() {
        let client = Client::new();
        let err = client
            .connect("127.0.0.1:1", "nobody")
            .await
            .expect_err("should fail");
        assert!(matches!(
            err,
            CourierError::Transport(TransportError::DialFailed(_))
        ));
        assert!(client.id().is_empty());
    }
}
