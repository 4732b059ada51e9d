/// Errors that can occur in the wire layer.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The message name does not fit the 1-byte length field.
    #[error("message name too long: {len} bytes (max 255)")]
    NameTooLong { len: usize },
}
