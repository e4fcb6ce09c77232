//! Tradewire - Async client for the cTrader Open API wire protocol
//!
//! Layers, bottom up:
//! - `protocol`: length-prefixed framing of protobuf envelopes
//! - `catalog`: payload-type tags and payload shapes
//! - `network`: the TLS/TCP session with its read and keep-alive loops
//! - `dispatch`: request/reply correlation and event fan-out
//! - `tenant`: per-account filtering of pushed events
//! - `client`: typed calls for applications and accounts

pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod network;
pub mod protocol;
pub mod tenant;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, Payload, ProtocolError};
pub use client::{Account, Client, Credentials};
pub use dispatch::{Dispatcher, RequestError, RequestResult, Subscription};
pub use network::{CloseReason, SessionConfig};
pub use tenant::TenantRouter;
