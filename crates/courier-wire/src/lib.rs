//! Wire layer for Courier.
//!
//! This crate defines what travels between peers and how:
//!
//! - **Identifiers** ([`uid`], [`MessageId`]) — short random+time-based ids
//!   for clients and messages.
//! - **Message model** ([`Message`], [`Meta`]) — one delivered frame in
//!   memory, with its flag byte.
//! - **Frame codec** ([`encode`], [`FrameDecoder`]) — the binary frame
//!   layout and its incremental, resumable stream parser.
//!
//! The wire layer knows nothing about connections or dispatch; it converts
//! between messages and bytes.

mod error;
mod frame;
mod id;
mod message;

pub use error::WireError;
pub use frame::{encode, FrameDecoder, MAX_NAME_LEN};
pub use id::{uid, MessageId};
pub use message::{Message, Meta};
