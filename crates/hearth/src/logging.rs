//! Tracing setup. Grounded on `horizon/src/logging.rs`'s
//! `tracing-subscriber` registry/filter/layer wiring.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_file(false).with_line_number(false).with_thread_ids(true))
            .init();
    }

    info!(level = %config.level, "logging initialized");
    Ok(())
}

pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown");
    info!("hearth realtime game server v{version}");
}
