//! # Courier
//!
//! Lightweight messaging between one server and many clients over TCP or
//! Unix domain sockets. Three patterns — fire-and-forget send,
//! request/reply, and named-topic subscription — are multiplexed over a
//! single persistent connection per client, framed by the binary codec in
//! [`courier-wire`](courier_wire).
//!
//! ```text
//! transport bytes → reader loop → frame decoder → rule table
//!                 → handler tasks → optional reply → transport
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use courier::{Client, Message, Server};
//!
//! # async fn run() -> Result<(), courier::CourierError> {
//! let server = Server::new();
//! server.on("", "repeat", |msg: &Message| {
//!     Some([msg.body.as_slice(), msg.body.as_slice()].concat())
//! });
//! let handle = server.clone();
//! tokio::spawn(async move { handle.listen("127.0.0.1:4321").await });
//!
//! let client = Client::new();
//! client.connect("127.0.0.1:4321", "client-a").await?;
//! let mut replies = client.request("repeat", b"this").await?;
//! let reply = replies.recv().await;
//! # Ok(()) }
//! ```

mod client;
mod error;
mod handler;
mod reader;
mod rules;
mod server;

pub use client::Client;
pub use error::CourierError;
pub use handler::Handler;
pub use server::{ClientInfo, Server};

// The wire and transport vocabulary callers need day to day.
pub use courier_transport::{Listener, TransportError};
pub use courier_wire::{uid, Message, MessageId, Meta, WireError};

/// Name of the synthetic message delivered through dispatch when a
/// connection's stream fails or closes. Subscribe to it like any other
/// message name.
pub const DISCONNECT: &str = "disconnect";

/// Name of the identity-exchange message both sides use at session start.
pub(crate) const HANDSHAKE: &str = "handshake";
