//! Listener setup and accept loop support.

use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

use crate::{is_socket_path, Stream, TransportError};

/// A bound listener over TCP or a Unix domain socket.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Binds the given address.
    ///
    /// For a Unix socket address, a bind failure with "address in use"
    /// removes the stale socket file and retries once — a leftover file
    /// from an unclean shutdown would otherwise keep the address occupied
    /// forever.
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        if is_socket_path(address) {
            #[cfg(unix)]
            {
                let listener = match UnixListener::bind(address) {
                    Ok(listener) => listener,
                    Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                        tracing::debug!(address, "removing stale socket file");
                        std::fs::remove_file(address)
                            .map_err(TransportError::BindFailed)?;
                        UnixListener::bind(address)
                            .map_err(TransportError::BindFailed)?
                    }
                    Err(e) => return Err(TransportError::BindFailed(e)),
                };
                tracing::info!(address, "listening on unix socket");
                return Ok(Listener::Unix(listener));
            }
            #[cfg(not(unix))]
            return Err(TransportError::UnsupportedAddress(address.to_string()));
        }

        let listener = TcpListener::bind(address)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(address, "listening on tcp");
        Ok(Listener::Tcp(listener))
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<Stream, TransportError> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener
                    .accept()
                    .await
                    .map_err(TransportError::AcceptFailed)?;
                tracing::debug!(%addr, "accepted tcp connection");
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let (stream, _) = listener
                    .accept()
                    .await
                    .map_err(TransportError::AcceptFailed)?;
                tracing::debug!("accepted unix connection");
                Ok(Stream::Unix(stream))
            }
        }
    }

    /// Returns the local TCP address the listener is bound to.
    ///
    /// Lets callers bind port 0 and discover the assigned port. Unix
    /// listeners have no socket address in this sense.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match self {
            Listener::Tcp(listener) => listener.local_addr(),
            #[cfg(unix)]
            Listener::Unix(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix listeners have no tcp address",
            )),
        }
    }
}
