// hearth-api: Async Rust client for the Home Assistant WebSocket and REST APIs

pub mod error;
pub mod rest;
pub mod socket;
pub mod transport;

pub use error::Error;
pub use rest::RestClient;
pub use socket::{Command, ConnectionState, EventSubscription, ReconnectConfig, SocketClient, SocketConfig};
