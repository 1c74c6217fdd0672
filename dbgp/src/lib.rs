//! Client for the DBGP debugger wire protocol.
//!
//! DBGP is connection-per-session and engine-initiated: the debugger engine
//! (e.g. Xdebug) dials the IDE, so this crate listens rather than connects.
//! [`Connection`] owns the socket and message framing, [`Client`] builds
//! commands and parses the typed responses in [`responses`].
pub mod bindings;
mod cancel;
mod client;
mod connection;
mod error;
pub mod properties;
pub mod reader;
pub mod responses;

pub use cancel::CancelToken;
pub use client::{Client, Init};
pub use connection::Connection;
pub use error::Error;

pub const DEFAULT_DBGP_PORT: u16 = 9000;

pub type Result<T> = std::result::Result<T, Error>;
