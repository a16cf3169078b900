//! Application configuration: loads [`hearth_server::ServerConfig`] plus
//! logging settings from a TOML file, creating a default file when none
//! exists. Grounded on `horizon/src/config.rs`'s `AppConfig::load_from_file`
//! pattern, trimmed of the teacher's spatial-region and GORC sections (no
//! counterpart in this spec) and of dynamic plugin-directory settings
//! (plugins here are registered in code, not loaded from disk — see
//! `app.rs`).

use std::path::Path;

use hearth_server::ServerConfig;
use serde::{Deserialize, Serialize};

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), json_format: false }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from `path`. If the file doesn't exist, writes a
    /// default configuration there and returns it, matching
    /// `horizon/src/config.rs`'s create-default-if-missing behavior.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            tracing::info!(path = %path.display(), "created default configuration file");
            Ok(default_config)
        }
    }

    /// Checks values that TOML deserialization alone can't rule out (spec
    /// §6's config fields have no invariants serde enforces on its own).
    pub fn validate(&self) -> Result<(), String> {
        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than zero".to_string());
        }
        if self.server.bind_address == self.server.admin_bind_address {
            return Err("server.bind_address and server.admin_bind_address must differ".to_string());
        }
        if self.server.security.max_connections_per_ip == 0 {
            return Err("server.security.max_connections_per_ip must be greater than zero".to_string());
        }
        Ok(())
    }
}
