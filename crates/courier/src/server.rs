//! Server session: the accept loop, the live-client registry, and the
//! shared rule table driven by every connection's reader loop.

use std::sync::{Arc, Mutex as StdMutex};

use courier_transport::{Listener, StreamReader, StreamWriter};
use courier_wire::{encode, uid, Message, MessageId, Meta};
use tokio::sync::{Mutex, Notify};

use crate::reader::{synthetic_disconnect, FrameReader};
use crate::rules::{lock, Rule, RuleTable};
use crate::{CourierError, Handler, HANDSHAKE};

/// One registered connection.
///
/// `id` is assigned at accept and stable for the connection's lifetime;
/// `name` is whatever the client declared in its handshake (empty until
/// then). The registry owns the entry; the connection's reader task only
/// takes the lock to remove it on disconnect.
struct ConnectedClient {
    id: String,
    name: String,
    writer: Arc<Mutex<StreamWriter>>,
    closed: Arc<Notify>,
}

type Registry = Arc<StdMutex<Vec<ConnectedClient>>>;

/// A registry snapshot entry, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: String,
    pub name: String,
}

/// A server session. Cheap to clone; all clones share the registry and
/// rule table, so listeners on several addresses feed one dispatch.
#[derive(Clone)]
pub struct Server {
    shared: Arc<ServerShared>,
}

struct ServerShared {
    clients: Registry,
    rules: RuleTable,
}

impl Server {
    /// Creates a server with the handshake-completion rule installed.
    ///
    /// The rule is registered once here, not per listener: with it, a
    /// request-flagged `"handshake"` message records the declared name on
    /// the sending client's registry entry and replies with that client's
    /// assigned id.
    pub fn new() -> Self {
        let clients: Registry = Arc::default();
        let rules = RuleTable::new();

        let registry = Arc::clone(&clients);
        let complete_handshake = move |msg: &Message| -> Option<Vec<u8>> {
            let mut clients = lock(&registry);
            let client = clients.iter_mut().find(|c| c.id == msg.author)?;
            client.name = String::from_utf8_lossy(&msg.body).into_owned();
            tracing::info!(id = %client.id, name = %client.name, "client identified");
            Some(client.id.clone().into_bytes())
        };
        rules.push(Rule::new(Arc::new(complete_handshake)).for_name(HANDSHAKE));

        Self {
            shared: Arc::new(ServerShared { clients, rules }),
        }
    }

    /// Binds `address` and serves it. Blocks until the listener fails.
    pub async fn listen(&self, address: &str) -> Result<(), CourierError> {
        let listener = Listener::bind(address).await?;
        self.serve(listener).await
    }

    /// Spawns one [`listen`](Self::listen) task per address and returns
    /// immediately.
    pub fn listen_all<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for address in addresses {
            let address = address.into();
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.listen(&address).await {
                    tracing::error!(%address, error = %e, "listener terminated");
                }
            });
        }
    }

    /// Runs the accept loop on an already-bound listener.
    ///
    /// Each accepted connection is assigned a fresh identity, registered,
    /// and handed to its own reader-loop task. Returns when accepting
    /// fails.
    pub async fn serve(&self, listener: Listener) -> Result<(), CourierError> {
        loop {
            let stream = match listener.accept().await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Err(e.into());
                }
            };

            let client_id = uid();
            let (reader, writer) = stream.into_split();
            let writer = Arc::new(Mutex::new(writer));
            let closed = Arc::new(Notify::new());

            lock(&self.shared.clients).push(ConnectedClient {
                id: client_id.clone(),
                name: String::new(),
                writer: Arc::clone(&writer),
                closed: Arc::clone(&closed),
            });
            tracing::debug!(id = %client_id, "client connected");

            let shared = Arc::clone(&self.shared);
            tokio::spawn(handle_client(shared, client_id, reader, writer, closed));
        }
    }

    /// Subscribes `handler` to messages named `msg_name` from clients
    /// registered as `author_name`. Either filter may be the empty-string
    /// wildcard.
    pub fn on(&self, author_name: &str, msg_name: &str, handler: impl Handler) {
        self.shared.rules.push(
            Rule::new(Arc::new(handler))
                .for_name(msg_name)
                .for_author(author_name),
        );
    }

    /// Like [`on`](Self::on), but the rule fires at most once.
    pub fn once(&self, author_name: &str, msg_name: &str, handler: impl Handler) {
        self.shared.rules.push(
            Rule::new(Arc::new(handler))
                .once()
                .for_name(msg_name)
                .for_author(author_name),
        );
    }

    /// Sends a message to every registered client, sequentially.
    ///
    /// The first failed write aborts the remainder and returns the error,
    /// leaving later clients un-notified.
    pub async fn broadcast(&self, name: &str, body: &[u8]) -> Result<(), CourierError> {
        self.send_matching(name, body, |_| true).await
    }

    /// [`broadcast`](Self::broadcast) restricted to clients whose
    /// registered name equals `client_name`.
    pub async fn send_to(
        &self,
        client_name: &str,
        name: &str,
        body: &[u8],
    ) -> Result<(), CourierError> {
        self.send_matching(name, body, |registered| registered == client_name)
            .await
    }

    async fn send_matching(
        &self,
        name: &str,
        body: &[u8],
        target: impl Fn(&str) -> bool,
    ) -> Result<(), CourierError> {
        // Snapshot under the registry lock, write outside it: replies from
        // handler tasks contend only on each stream's own lock.
        let writers: Vec<Arc<Mutex<StreamWriter>>> = {
            let clients = lock(&self.shared.clients);
            clients
                .iter()
                .filter(|c| target(&c.name))
                .map(|c| Arc::clone(&c.writer))
                .collect()
        };

        let meta = Meta::default().with_body(!body.is_empty());
        for writer in writers {
            let frame = encode(MessageId::generate(), meta, name, body)?;
            writer.lock().await.write_all(&frame).await?;
        }
        Ok(())
    }

    /// Closes the first client whose id or registered name matches.
    ///
    /// The entry is not removed here: removal happens when that client's
    /// reader loop observes the closed stream and cleans up, so the
    /// `"disconnect"` dispatch still resolves the author.
    pub async fn disconnect(&self, id_or_name: &str) -> Result<(), CourierError> {
        let target = {
            let clients = lock(&self.shared.clients);
            clients
                .iter()
                .find(|c| c.id == id_or_name || c.name == id_or_name)
                .map(|c| (Arc::clone(&c.writer), Arc::clone(&c.closed)))
        };

        if let Some((writer, closed)) = target {
            // notify_one stores a permit, so the reader loop sees the
            // signal even if it is mid-dispatch rather than parked.
            closed.notify_one();
            writer.lock().await.shutdown().await?;
        }
        Ok(())
    }

    /// A snapshot of the currently registered clients.
    pub fn clients(&self) -> Vec<ClientInfo> {
        lock(&self.shared.clients)
            .iter()
            .map(|c| ClientInfo {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one client's frames until its stream ends, then removes it from
/// the registry.
async fn handle_client(
    shared: Arc<ServerShared>,
    client_id: String,
    reader: StreamReader,
    writer: Arc<Mutex<StreamWriter>>,
    closed: Arc<Notify>,
) {
    let mut frames = FrameReader::new(client_id.clone(), reader);
    loop {
        tokio::select! {
            maybe = frames.next() => match maybe {
                Some(msg) => dispatch(&shared, msg, &writer),
                None => break,
            },
            _ = closed.notified() => {
                // Closed from our side; the disconnect message is
                // delivered locally while the entry is still registered.
                dispatch(&shared, synthetic_disconnect(&client_id), &writer);
                break;
            }
        }
    }

    lock(&shared.clients).retain(|c| c.id != client_id);
    tracing::debug!(id = %client_id, "client disconnected");
}

/// Matches `msg` against the rule table and launches one detached task per
/// selected handler. For request-flagged messages every task writes its
/// handler's return value back on the arrival stream, reusing the request
/// id — one reply per matched rule.
fn dispatch(shared: &Arc<ServerShared>, msg: Message, writer: &Arc<Mutex<StreamWriter>>) {
    // Resolve the author's registered name once, before the scan; rules
    // filtering on an author that cannot be resolved do not match.
    let author_name = {
        let clients = lock(&shared.clients);
        clients
            .iter()
            .find(|c| c.id == msg.author)
            .map(|c| c.name.clone())
    };

    let handlers = shared.rules.matching(&msg, author_name.as_deref());
    if handlers.is_empty() {
        return;
    }

    let msg = Arc::new(msg);
    for handler in handlers {
        let msg = Arc::clone(&msg);
        let writer = Arc::clone(writer);
        tokio::spawn(async move {
            let reply = handler.invoke(&msg);
            if !msg.meta.is_request() {
                return;
            }
            let body = reply.unwrap_or_default();
            let meta = Meta::default().with_body(!body.is_empty());
            match encode(msg.id, meta, &msg.name, &body) {
                Ok(frame) => {
                    if let Err(e) = writer.lock().await.write_all(&frame).await {
                        tracing::debug!(error = %e, "reply write failed");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "reply encode failed"),
            }
        });
    }
}
