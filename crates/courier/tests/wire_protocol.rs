//! Tests that drive the server with hand-encoded frames over a raw stream,
//! pinning the on-the-wire contract independently of the `Client` type.

use std::collections::VecDeque;
use std::time::Duration;

use courier::{Listener, Message, Server};
use courier_transport::{dial, StreamReader, StreamWriter};
use courier_wire::{encode, FrameDecoder, MessageId, Meta};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

/// A peer speaking the protocol byte-by-byte, without the `Client` layer.
struct RawPeer {
    reader: StreamReader,
    writer: StreamWriter,
    decoder: FrameDecoder,
    queue: VecDeque<Message>,
}

impl RawPeer {
    async fn dial(addr: &str) -> Self {
        let (reader, writer) = dial(addr).await.expect("dial").into_split();
        Self {
            reader,
            writer,
            decoder: FrameDecoder::new(),
            queue: VecDeque::new(),
        }
    }

    async fn write_frame(&mut self, id: MessageId, meta: Meta, name: &str, body: &[u8]) {
        let frame = encode(id, meta, name, body).expect("encode");
        self.writer.write_all(&frame).await.expect("write");
    }

    async fn next(&mut self) -> Message {
        timeout(WAIT, async {
            loop {
                if let Some(msg) = self.queue.pop_front() {
                    return msg;
                }
                let mut chunk = [0u8; 1024];
                let n = self.reader.read(&mut chunk).await.expect("read");
                assert_ne!(n, 0, "stream closed while expecting a frame");
                self.queue.extend(self.decoder.feed(&chunk[..n]));
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    async fn expect_quiet(&mut self) {
        assert!(self.queue.is_empty());
        let mut chunk = [0u8; 1024];
        let res = timeout(QUIET, self.reader.read(&mut chunk)).await;
        assert!(res.is_err(), "unexpected bytes from the server");
    }

    /// Performs the handshake and returns the assigned client id.
    async fn handshake(&mut self, name: &str) -> String {
        let id = MessageId::generate();
        self.write_frame(id, Meta::request().with_body(true), "handshake", name.as_bytes())
            .await;
        let reply = self.next().await;
        assert_eq!(reply.name, "handshake");
        assert_eq!(reply.id, id, "reply reuses the request id");
        String::from_utf8_lossy(&reply.body).into_owned()
    }
}

async fn start_server() -> (Server, String) {
    let server = Server::new();
    let listener = Listener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let handle = server.clone();
    tokio::spawn(async move {
        let _ = handle.serve(listener).await;
    });
    (server, addr)
}

#[tokio::test]
async fn test_handshake_over_raw_bytes() {
    let (server, addr) = start_server().await;
    let mut peer = RawPeer::dial(&addr).await;

    let assigned = peer.handshake("raw-peer").await;
    assert_eq!(assigned.len(), 12);

    let clients = server.clients();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, assigned);
    assert_eq!(clients[0].name, "raw-peer");
}

#[tokio::test]
async fn test_multiple_matching_rules_write_multiple_replies() {
    // Two rules matching one request-flagged message each write their own
    // reply with the request's id. The raw peer sees both; the `Client`
    // type would deliver only the first, its reply rule being one-shot.
    let (server, addr) = start_server().await;
    server.on("", "both", |_msg: &Message| Some(b"one".to_vec()));
    server.on("", "both", |_msg: &Message| Some(b"two".to_vec()));

    let mut peer = RawPeer::dial(&addr).await;
    peer.handshake("raw-peer").await;

    let req = MessageId::generate();
    peer.write_frame(req, Meta::request(), "both", b"").await;

    // Handler tasks run concurrently; reply order is not guaranteed.
    let first = peer.next().await;
    let second = peer.next().await;
    assert_eq!(first.id, req);
    assert_eq!(second.id, req);
    let mut bodies = [first.body, second.body];
    bodies.sort();
    assert_eq!(bodies, [b"one".to_vec(), b"two".to_vec()]);
}

#[tokio::test]
async fn test_no_reply_for_unflagged_messages() {
    // A matched handler's return value is only written back when the
    // message carries the request flag.
    let (server, addr) = start_server().await;
    server.on("", "greet", |_msg: &Message| Some(b"ignored".to_vec()));

    let mut peer = RawPeer::dial(&addr).await;
    peer.handshake("raw-peer").await;

    peer.write_frame(MessageId::generate(), Meta::default().with_body(true), "greet", b"hi")
        .await;
    peer.expect_quiet().await;
}

#[tokio::test]
async fn test_frames_split_across_writes_are_reassembled() {
    let (server, addr) = start_server().await;
    server.on("", "echo", |msg: &Message| Some(msg.body.clone()));

    let mut peer = RawPeer::dial(&addr).await;
    peer.handshake("raw-peer").await;

    // Hand-feed a request frame a few bytes at a time.
    let req = MessageId::generate();
    let frame = encode(req, Meta::request().with_body(true), "echo", b"slowly")
        .expect("encode");
    for piece in frame.chunks(3) {
        peer.writer.write_all(piece).await.expect("write");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let reply = peer.next().await;
    assert_eq!(reply.id, req);
    assert_eq!(reply.body, b"slowly");
}
