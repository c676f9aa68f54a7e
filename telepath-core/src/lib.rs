#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod events;
pub mod heartbeat;
pub mod notification;
pub mod registry;
pub mod session;

pub use registry::{Registry, RegistryError, RegistryStatus};
