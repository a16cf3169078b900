//! Graceful shutdown signal handling. Grounded on `horizon/src/signals.rs`,
//! adapted to use [`hearth_core::ShutdownState`] instead of redefining one.

use hearth_core::ShutdownState;
use tokio::signal;
use tracing::{info, warn};

/// Waits for SIGINT/SIGTERM (Ctrl+C on Windows), marks `shutdown` initiated,
/// and returns. Spawns a second listener that exits the process immediately
/// if a signal arrives again while graceful shutdown is already underway.
pub async fn wait_for_shutdown(shutdown: ShutdownState) {
    wait_for_signal().await;
    info!("shutdown signal received, beginning graceful shutdown");
    shutdown.initiate_shutdown();

    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("second shutdown signal received, exiting immediately");
        std::process::exit(1);
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => (),
        }
    }

    #[cfg(windows)]
    {
        let _ = signal::ctrl_c().await;
    }
}
