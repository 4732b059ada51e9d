//! Bidirectional byte streams over TCP or Unix domain sockets.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::{is_socket_path, TransportError};

/// One established connection, before it is split for concurrent use.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    /// Splits into an owned read half and an owned write half so one task
    /// can block on reads while others write.
    pub fn into_split(self) -> (StreamReader, StreamWriter) {
        match self {
            Stream::Tcp(stream) => {
                let (r, w) = stream.into_split();
                (StreamReader::Tcp(r), StreamWriter::Tcp(w))
            }
            #[cfg(unix)]
            Stream::Unix(stream) => {
                let (r, w) = stream.into_split();
                (StreamReader::Unix(r), StreamWriter::Unix(w))
            }
        }
    }
}

/// Opens an outbound connection.
///
/// An address starting with `/` and ending in `.sock` selects a Unix
/// domain socket; anything else is parsed as TCP `host:port`.
pub async fn dial(address: &str) -> Result<Stream, TransportError> {
    if is_socket_path(address) {
        #[cfg(unix)]
        {
            let stream = UnixStream::connect(address)
                .await
                .map_err(TransportError::DialFailed)?;
            tracing::debug!(address, "dialed unix socket");
            return Ok(Stream::Unix(stream));
        }
        #[cfg(not(unix))]
        return Err(TransportError::UnsupportedAddress(address.to_string()));
    }

    let stream = TcpStream::connect(address)
        .await
        .map_err(TransportError::DialFailed)?;
    tracing::debug!(address, "dialed tcp");
    Ok(Stream::Tcp(stream))
}

/// The read half of a [`Stream`].
#[derive(Debug)]
pub enum StreamReader {
    Tcp(tokio::net::tcp::OwnedReadHalf),
    #[cfg(unix)]
    Unix(tokio::net::unix::OwnedReadHalf),
}

impl StreamReader {
    /// Reads up to `buf.len()` bytes. `Ok(0)` means end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = match self {
            StreamReader::Tcp(r) => r.read(buf).await,
            #[cfg(unix)]
            StreamReader::Unix(r) => r.read(buf).await,
        };
        n.map_err(TransportError::ReadFailed)
    }
}

/// The write half of a [`Stream`].
#[derive(Debug)]
pub enum StreamWriter {
    Tcp(tokio::net::tcp::OwnedWriteHalf),
    #[cfg(unix)]
    Unix(tokio::net::unix::OwnedWriteHalf),
}

impl StreamWriter {
    /// Writes the whole buffer.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let res = match self {
            StreamWriter::Tcp(w) => w.write_all(buf).await,
            #[cfg(unix)]
            StreamWriter::Unix(w) => w.write_all(buf).await,
        };
        res.map_err(TransportError::WriteFailed)
    }

    /// Shuts down the write side, signalling end of stream to the peer.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        let res = match self {
            StreamWriter::Tcp(w) => w.shutdown().await,
            #[cfg(unix)]
            StreamWriter::Unix(w) => w.shutdown().await,
        };
        res.map_err(TransportError::WriteFailed)
    }
}
