//! # hearth_server
//!
//! The networked half of the substrate: the WebSocket-class `ConnectionHub`,
//! the `LifecycleCoordinator` that implements spec §4.F's join/reconnect/
//! disconnect/host-transfer state machine, the outbound `PlatformClient`,
//! transport-hygiene security, and the read-only health/admin HTTP surface.

pub mod admin;
pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod platform;
pub mod security;

pub use config::ServerConfig;
pub use connection::ConnectionHub;
pub use error::{LifecycleError, ServerError};
pub use lifecycle::LifecycleCoordinator;
pub use platform::PlatformClient;
