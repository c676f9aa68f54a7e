//! Wire types shared by the Telepath relay server and its clients.
//!
//! Enable the `client` feature for a typed HTTP client and a WebSocket
//! session client.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
