//! # hearth_plugins
//!
//! The typed plugin interface (`GamePlugin`), the hub callback surface
//! plugins are given (`HubHandle`), and the `PluginRegistry` that owns
//! every registered game for the lifetime of the server.

pub mod error;
pub mod examples;
pub mod plugin;
pub mod registry;

pub use error::PluginError;
pub use plugin::{GamePlugin, HubHandle, PluginEventContext};
pub use registry::{PluginRegistry, PluginStats};
