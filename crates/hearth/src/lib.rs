//! # hearth
//!
//! The binary crate: CLI parsing, configuration loading, logging setup,
//! signal handling, and the top-level wiring that turns the library
//! crates (`hearth_core`, `hearth_plugins`, `hearth_server`,
//! `hearth_cycles`) into a running server.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

pub use app::Application;
pub use cli::CliArgs;
