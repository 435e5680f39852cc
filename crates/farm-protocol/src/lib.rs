//! farm-protocol
//!
//! Wire types and the line codec for the farm server's protocol: one JSON
//! object per line, request/response correlated by an opaque `requestId`,
//! plus uncorrelated server pushes.

pub mod codec;
pub mod wire;

pub use codec::{decode_request, DecodeError, Decoded};
pub use wire::{FriendInfo, Info, PushCellUpdate, Request, Response};
