/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening an outbound connection failed.
    #[error("dial failed: {0}")]
    DialFailed(#[source] std::io::Error),

    /// Binding a listener failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Reading from the stream failed.
    #[error("read failed: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// Writing to the stream failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The address names a transport this platform cannot provide.
    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),
}
