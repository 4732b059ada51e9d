//! Identifier generation.
//!
//! Two forms: [`uid`] produces a short human-readable string used to name
//! connected clients, and [`MessageId`] is the 12-byte binary identifier
//! carried by every frame and used for request/reply correlation.
//!
//! Neither form is cryptographically unpredictable. Both mix a random part
//! with the low bits of a nanosecond timestamp; two ids generated under the
//! same timestamp can in principle collide, which is acceptable for
//! correlation and diagnostics.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// The 64-symbol alphabet used by [`uid`]: `a-z`, `A-Z`, `0-9`, `-`, `_`.
/// Each symbol encodes exactly 6 bits.
const ALPHABET: [u8; 64] =
    *b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";

/// Nanoseconds since the Unix epoch, truncated to 64 bits.
fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Generates a 12-character client identifier.
///
/// The first 7 characters consume 6 bits each of a random `u64`; the last
/// 5 consume 6 bits each of the low bits of a nanosecond timestamp.
pub fn uid() -> String {
    let mut rd: u64 = rand::rng().random();
    let mut ns = unix_nanos();

    let mut out = String::with_capacity(12);
    for _ in 0..7 {
        out.push(ALPHABET[(rd & 63) as usize] as char);
        rd >>= 6;
    }
    for _ in 0..5 {
        out.push(ALPHABET[(ns & 63) as usize] as char);
        ns >>= 6;
    }
    out
}

/// The 12-byte binary identifier carried by every frame.
///
/// Bytes 0..4 are the low 32 bits of a nanosecond timestamp (big-endian),
/// bytes 4..12 are a random `u64` (big-endian). Ids are compared for
/// equality only; the timestamp prefix carries no ordering guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageId([u8; Self::LEN]);

impl MessageId {
    /// Length of an id in bytes.
    pub const LEN: usize = 12;

    /// Generates a fresh id.
    pub fn generate() -> Self {
        let ns = unix_nanos();
        let rd: u64 = rand::rng().random();

        let mut bytes = [0u8; Self::LEN];
        bytes[..4].copy_from_slice(&(ns as u32).to_be_bytes());
        bytes[4..].copy_from_slice(&rd.to_be_bytes());
        Self(bytes)
    }

    /// Wraps raw bytes as an id.
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_has_fixed_length() {
        assert_eq!(uid().len(), 12);
    }

    #[test]
    fn test_uid_successive_calls_differ() {
        // The random part makes a repeat vanishingly unlikely even under
        // an identical timestamp.
        assert_ne!(uid(), uid());
    }

    #[test]
    fn test_uid_uses_documented_alphabet() {
        let id = uid();
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)), "unexpected symbol in {id}");
    }

    #[test]
    fn test_message_id_has_fixed_length() {
        assert_eq!(MessageId::generate().as_bytes().len(), MessageId::LEN);
    }

    #[test]
    fn test_message_id_successive_calls_differ() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }

    #[test]
    fn test_message_id_round_trips_raw_bytes() {
        let bytes = [7u8; 12];
        assert_eq!(MessageId::from_bytes(bytes).as_bytes(), &bytes);
    }

    #[test]
    fn test_message_id_display_is_hex() {
        let id = MessageId::from_bytes([0x0a; 12]);
        assert_eq!(id.to_string(), "0a".repeat(12));
    }
}
