//! Server configuration types and defaults. Grounded on
//! `game_server/src/config.rs`; trimmed of the teacher's spatial-region
//! fields (`region_bounds`, `plugin_safety`) which have no counterpart in
//! this spec.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket game port.
    pub bind_address: SocketAddr,
    /// Read-only admin HTTP surface (spec §6, "HTTP admin surface").
    pub admin_bind_address: SocketAddr,
    pub max_connections: usize,
    /// Client-silence timeout in seconds before a connection is considered
    /// gone (spec §4.E, "~5 min").
    pub connection_timeout_secs: u64,
    /// Broadcast coalescing window in milliseconds (spec §4.E, default 100).
    pub broadcast_window_ms: u64,
    pub cors_origins: Vec<String>,
    /// Base URL of the external platform collaborator. Absent in
    /// self-hosted / non-platform deployments.
    pub platform_base_url: Option<String>,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_rate_limiting: bool,
    pub max_requests_per_minute: u32,
    pub max_message_size: usize,
    pub max_json_depth: usize,
    pub max_string_length: usize,
    pub max_collection_size: usize,
    pub banned_ips: Vec<IpAddr>,
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".parse().expect("valid default bind address"),
            admin_bind_address: "0.0.0.0:3002".parse().expect("valid default admin address"),
            max_connections: 10_000,
            connection_timeout_secs: 300,
            broadcast_window_ms: 100,
            cors_origins: Vec::new(),
            platform_base_url: None,
            security: SecurityConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            max_requests_per_minute: 600,
            max_message_size: 1024 * 1024, // spec §4.E, ~1 MiB per-message cap
            max_json_depth: 10,
            max_string_length: 4096,
            max_collection_size: 256,
            banned_ips: Vec::new(),
            max_connections_per_ip: 20,
        }
    }
}

impl ServerConfig {
    /// Overlays environment variables on top of whatever was loaded from
    /// TOML/defaults, following `horizon/src/config.rs`'s precedence
    /// (env > file > struct default). Only the variables spec §6 names are
    /// recognized; unknown ones are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.bind_address.set_port(port);
            }
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.cors_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(base_url) = std::env::var("PLATFORM_BASE_URL") {
            self.platform_base_url = Some(base_url);
        }
    }
}
