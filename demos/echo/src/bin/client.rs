//! Demo client: connect, subscribe, send, request, disconnect.
//!
//! Run with `cargo run -p echo-demo --bin client -- client-a` (the argument
//! is the declared name; defaults to "client-a").

use std::time::Duration;

use courier::{Client, Message, DISCONNECT};

const SOCKET: &str = "/tmp/courier-echo.sock";

#[tokio::main]
async fn main() -> Result<(), courier::CourierError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "client-a".into());

    let client = Client::new();
    client.connect(SOCKET, &name).await?;
    tracing::info!(id = %client.id(), "connected");

    client.on(DISCONNECT, |_msg: &Message| {
        tracing::info!("server went away");
        None
    });

    // Catch-all: print everything the server pushes.
    client.on("", |msg: &Message| {
        tracing::info!(name = %msg.name, body = %String::from_utf8_lossy(&msg.body), "from server");
        None
    });

    client.send("greet", b"a fire-and-forget hello").await?;

    let reply = client
        .request_timeout("repeat", b"this", Duration::from_secs(5))
        .await?;
    tracing::info!(body = %String::from_utf8_lossy(&reply.body), "repeat reply");

    tokio::time::sleep(Duration::from_secs(5)).await;
    client.disconnect().await?;
    Ok(())
}
