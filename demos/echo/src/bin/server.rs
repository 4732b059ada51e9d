//! Demo server: subscriptions, a request handler, and periodic broadcasts.
//!
//! Run with `cargo run -p echo-demo --bin server`, then start one or more
//! clients. Listens on a Unix socket and a TCP port simultaneously.

use std::time::Duration;

use courier::{Message, Server, DISCONNECT};

const SOCKET: &str = "/tmp/courier-echo.sock";
const TCP: &str = "127.0.0.1:4321";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server = Server::new();

    // Any client, message "greet".
    server.on("", "greet", |msg: &Message| {
        tracing::info!(author = %msg.author, body = %String::from_utf8_lossy(&msg.body), "greet");
        None
    });

    // Only messages from the client that declared itself "client-a".
    server.on("client-a", "greet", |_msg: &Message| {
        tracing::info!("greet from client-a specifically");
        None
    });

    // Fires for the first matching message, then never again.
    server.once("client-b", "greet", |_msg: &Message| {
        tracing::info!("first greet from client-b (once)");
        None
    });

    // Every message from client-b, whatever its name.
    server.on("client-b", "", |msg: &Message| {
        tracing::info!(name = %msg.name, "message from client-b");
        None
    });

    // Request handler: echo the body doubled.
    server.on("", "repeat", |msg: &Message| {
        Some([msg.body.as_slice(), msg.body.as_slice()].concat())
    });

    server.on("", DISCONNECT, |msg: &Message| {
        tracing::info!(author = %msg.author, "client went away");
        None
    });

    server.listen_all([SOCKET, TCP]);

    let mut count: u64 = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if let Err(e) = server
            .broadcast("tick", format!("tick {count}").as_bytes())
            .await
        {
            tracing::warn!(error = %e, "broadcast failed");
        }
        if let Err(e) = server
            .send_to("client-a", "special", b"just for client-a")
            .await
        {
            tracing::warn!(error = %e, "send failed");
        }
        count += 1;
    }
}
