//! Unified error type for the Courier facade.

use courier_transport::TransportError;
use courier_wire::WireError;

/// Top-level error wrapping the sub-crate errors.
///
/// The `#[from]` variants let `?` convert transport and wire errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// A transport-level error (dial, bind, accept, read, write).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-level error (frame encoding).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The operation needs a completed handshake and there is none —
    /// either the session never connected or it was disconnected.
    #[error("not connected")]
    NotConnected,

    /// No reply arrived within the caller's deadline.
    #[error("request timed out")]
    RequestTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let courier_err: CourierError = err.into();
        assert!(matches!(courier_err, CourierError::Transport(_)));
        assert!(courier_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_wire_error() {
        let err = WireError::NameTooLong { len: 300 };
        let courier_err: CourierError = err.into();
        assert!(matches!(courier_err, CourierError::Wire(_)));
    }

    #[test]
    fn test_not_connected_message() {
        assert_eq!(CourierError::NotConnected.to_string(), "not connected");
    }
}
