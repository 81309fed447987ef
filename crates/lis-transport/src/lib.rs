//! LIS Transport Layer
//!
//! Provides the message channel seam between the wire and the server:
//! - [`Connection`] — paired channels of already-parsed protocol messages.
//! - An in-memory connection pair for tests.
//! - A Content-Length-framed stdio driver for the binary.
//!
//! Wire-format detail stops at framing; the server never touches bytes.

pub mod connection;
pub mod stdio;

pub use connection::{Connection, ConnectionError};
pub use stdio::stdio_connection;
