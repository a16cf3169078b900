//! Top-level wiring and the graceful-shutdown sequence. Grounded on
//! `horizon/src/app.rs`'s `Application::new`/`run`, adapted from Horizon's
//! event-system statistics reporting to hearth's substrate: the room
//! registry, session store, plugin registry, connection hub, lifecycle
//! coordinator, and admin HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hearth_core::{registry, session, RoomRegistry, SessionStore, ShutdownState};
use hearth_cycles::LightcyclesPlugin;
use hearth_plugins::{GamePlugin, HubHandle, PluginRegistry};
use hearth_server::admin::{self, AdminState};
use hearth_server::connection::{self, ConnectionHub};
use hearth_server::health::{metrics as metrics_reporter, Metrics, StartTime};
use hearth_server::security::RateLimiter;
use hearth_server::{LifecycleCoordinator, PlatformClient};
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::{display_banner, setup_logging};
use crate::signals::wait_for_shutdown;

/// Time given to in-flight work before tasks are aborted (spec §5, phase 3).
const DRAIN_TIMEOUT: Duration = Duration::from_secs(8);
/// Interval at which stale rate-limiter buckets are evicted.
const RATE_LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Loads configuration, applies CLI overrides, validates the result,
    /// and initializes logging — in that order, matching
    /// `horizon/src/app.rs::Application::new` (config is loaded and
    /// validated before anything is logged through the real subscriber).
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address.parse()?;
        }
        if let Some(admin_bind_address) = args.admin_bind_address {
            config.server.admin_bind_address = admin_bind_address.parse()?;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        config.server.apply_env_overrides();

        config.validate().map_err(|e| anyhow::anyhow!("configuration validation failed: {e}"))?;

        setup_logging(&config.logging, args.json_logs)?;
        info!(path = %args.config_path.display(), "configuration loaded and validated");

        Ok(Self { config })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        display_banner();
        let config = self.config;
        info!(
            bind_address = %config.server.bind_address,
            admin_bind_address = %config.server.admin_bind_address,
            max_connections = config.server.max_connections,
            "starting hearth server"
        );

        let rooms = RoomRegistry::new();
        let sessions = SessionStore::new();
        let plugins = Arc::new(PluginRegistry::new());
        let metrics = Metrics::new();
        let start_time = Arc::new(StartTime::now());
        let platform = Arc::new(PlatformClient::new(config.server.platform_base_url.clone()));

        let hub = ConnectionHub::new(
            rooms.clone(),
            Duration::from_millis(config.server.broadcast_window_ms),
            metrics.clone(),
        );
        let hub_handle: Arc<dyn HubHandle> = hub.clone();

        let lifecycle =
            LifecycleCoordinator::new(rooms.clone(), sessions.clone(), plugins.clone(), hub_handle.clone(), platform);

        register_plugins(&plugins, &hub_handle).await?;

        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let shutdown_state = ShutdownState::new();

        let reaper_handle = registry::spawn_reaper(rooms.clone(), shutdown_tx.subscribe());
        let session_reaper_handle = session::spawn_reaper(sessions.clone(), shutdown_tx.subscribe());
        let metrics_handle = metrics_reporter::spawn_reporter(metrics.clone(), rooms.clone(), shutdown_tx.subscribe());

        let rate_limiter = Arc::new(RateLimiter::new(
            config.server.security.max_requests_per_minute,
            Duration::from_secs(60),
        ));
        let cleanup_handle = spawn_rate_limiter_cleanup(rate_limiter.clone(), shutdown_tx.subscribe());

        let admin_handle = spawn_admin_server(
            config.server.admin_bind_address,
            AdminState { rooms: rooms.clone(), sessions: sessions.clone(), plugins: plugins.clone(), metrics, start_time },
            shutdown_tx.subscribe(),
        );

        // Bind before spawning the accept loop so a bind failure fails
        // startup directly (spec §6, "non-zero if the listener fails to
        // bind") instead of being silently dropped inside a JoinHandle.
        let game_listener = connection::bind(config.server.bind_address).await?;
        let game_port_handle = tokio::spawn(connection::serve(
            game_listener,
            hub,
            lifecycle,
            config.server.security.clone(),
            rate_limiter,
            shutdown_tx.subscribe(),
        ));

        info!("hearth server is running, press Ctrl+C to shut down");
        wait_for_shutdown(shutdown_state.clone()).await;

        info!("phase 1: signalling background tasks to stop");
        let _ = shutdown_tx.send(());

        info!("phase 2: waiting for in-flight work to settle");
        if tokio::time::timeout(DRAIN_TIMEOUT, async {
            let _ = reaper_handle.await;
            let _ = session_reaper_handle.await;
            let _ = metrics_handle.await;
            let _ = cleanup_handle.await;
        })
        .await
        .is_err()
        {
            warn!("background tasks did not settle within the drain timeout, proceeding");
        }
        shutdown_state.complete_shutdown();

        info!("phase 3: stopping accept loops");
        if let Err(err) = tokio::time::timeout(DRAIN_TIMEOUT, game_port_handle).await {
            warn!(error = %err, "game port accept loop did not stop within the drain timeout");
        }
        if let Err(err) = tokio::time::timeout(DRAIN_TIMEOUT, admin_handle).await {
            warn!(error = %err, "admin server did not stop within the drain timeout");
        }

        info!("phase 4: shutting down plugins");
        plugins.destroy().await;

        info!("hearth server shutdown complete");
        Ok(())
    }
}

/// Registers every compiled-in plugin (spec §4.D). Plugins here are
/// statically linked, not dynamically loaded from disk, so there is no
/// plugin-directory scan to perform. `hearth_plugins::examples` ships a
/// second, minimal plugin for reference but isn't wired in here.
async fn register_plugins(plugins: &Arc<PluginRegistry>, hub: &Arc<dyn HubHandle>) -> anyhow::Result<()> {
    let lightcycles: Arc<dyn GamePlugin> = Arc::new(LightcyclesPlugin::new());
    plugins.register(lightcycles, hub.clone()).await?;

    info!(plugins = ?plugins.ids(), "plugins registered");
    Ok(())
}

fn spawn_admin_server(
    bind_address: SocketAddr,
    state: AdminState,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(bind_address).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%bind_address, error = %err, "failed to bind admin http server");
                return;
            }
        };
        info!(%bind_address, "admin http surface listening");
        let router = admin::router(state);
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        });
        if let Err(err) = serve.await {
            error!(error = %err, "admin http server error");
        }
    })
}

fn spawn_rate_limiter_cleanup(
    rate_limiter: Arc<RateLimiter>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMITER_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    rate_limiter.cleanup_old_entries().await;
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}
