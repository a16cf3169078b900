//! Command-line argument parsing. Grounded on `horizon/src/cli.rs`'s
//! `clap::Command` builder usage, trimmed of the teacher's plugin-safety
//! flags (`danger-allow-unsafe-plugins` and friends), which guard dynamic
//! `.so`/`.dll` plugin loading — this server's plugins are compiled in.

use std::path::PathBuf;

use clap::{Arg, Command};

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub bind_address: Option<String>,
    pub admin_bind_address: Option<String>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl CliArgs {
    pub fn parse() -> Self {
        let matches = Command::new("hearth")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Multi-tenant realtime game server")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDRESS")
                    .help("Game port bind address (e.g. 0.0.0.0:3001)"),
            )
            .arg(
                Arg::new("admin-bind")
                    .long("admin-bind")
                    .value_name("ADDRESS")
                    .help("Admin HTTP bind address (e.g. 0.0.0.0:3002)"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: PathBuf::from(
                matches.get_one::<String>("config").expect("default config path is always set"),
            ),
            bind_address: matches.get_one::<String>("bind").cloned(),
            admin_bind_address: matches.get_one::<String>("admin-bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}
