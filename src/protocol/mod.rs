//! Protocol module - Defines the wire format for Tradewire sessions
//!
//! Every frame on the stream is:
//! - 4 bytes envelope length (big-endian)
//! - Variable length protobuf envelope (payload type, payload, request id)
//!
//! The envelope payload is itself a protobuf message selected from the
//! [`crate::catalog`] by its payload type.

mod codec;
mod envelope;

pub use codec::*;
pub use envelope::*;

/// Default API host
pub const DEFAULT_HOST: &str = "demo.ctraderapi.com";

/// Default TLS port of the protobuf endpoint
pub const DEFAULT_PORT: u16 = 5035;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum envelope size accepted by default (10 MB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;
