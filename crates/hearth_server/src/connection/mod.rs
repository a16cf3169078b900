//! The accept loop and per-connection read/write tasks: the networked edge
//! of the substrate. Grounded on `game_server/src/server/handlers.rs`'s
//! `handle_connection` (WebSocket handshake, split sink/stream, spawn
//! incoming+outgoing tasks) and `connection/manager.rs`'s per-connection
//! channel registration, adapted from the teacher's broadcast-channel
//! fan-out to `ConnectionHub`'s per-connection `mpsc` senders (spec §4.E).

pub mod frame;
pub mod hub;

pub use frame::{InboundFrame, OutboundFrame};
pub use hub::ConnectionHub;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hearth_core::ConnectionIdAllocator;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::SecurityConfig;
use crate::error::{LifecycleError, ServerError};
use crate::lifecycle::LifecycleCoordinator;
use crate::security::{input_validation, RateLimiter};

/// Per-IP connection counts for [`SecurityConfig::max_connections_per_ip`].
/// Kept here rather than in `ConnectionHub`, which indexes by connection id
/// and has no reason to know about source addresses.
type IpConnectionCounts = Arc<DashMap<std::net::IpAddr, u32>>;

/// Binds the game-port listener. Split out from [`serve`] so the caller can
/// fail startup (non-zero exit, spec §6) on a bind error before the accept
/// loop is ever spawned onto a background task, where a `Result` would
/// otherwise go unobserved.
pub async fn bind(bind_address: SocketAddr) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|e| ServerError::Network(format!("bind {bind_address} failed: {e}")))?;
    info!(%bind_address, "game port listening");
    Ok(listener)
}

/// Runs the game-port accept loop over an already-bound `listener` until
/// `shutdown` fires. Each accepted connection is handled on its own task
/// (spec §4.E).
pub async fn serve(
    listener: TcpListener,
    hub: Arc<ConnectionHub>,
    lifecycle: Arc<LifecycleCoordinator>,
    security: SecurityConfig,
    rate_limiter: Arc<RateLimiter>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let allocator = Arc::new(ConnectionIdAllocator::new());
    let ip_counts: IpConnectionCounts = Arc::new(DashMap::new());
    let security = Arc::new(security);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        if security.banned_ips.contains(&addr.ip()) {
                            debug!(%addr, "rejecting connection from banned ip");
                            continue;
                        }
                        if security.enable_rate_limiting && !rate_limiter.check_rate_limit(addr.ip()).await {
                            debug!(%addr, "rejecting connection over rate limit");
                            continue;
                        }
                        {
                            let mut count = ip_counts.entry(addr.ip()).or_insert(0);
                            if *count >= security.max_connections_per_ip {
                                debug!(%addr, "rejecting connection, per-ip limit reached");
                                continue;
                            }
                            *count += 1;
                        }

                        let hub = hub.clone();
                        let lifecycle = lifecycle.clone();
                        let allocator = allocator.clone();
                        let security = security.clone();
                        let ip_counts = ip_counts.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, addr, hub, lifecycle, allocator, security).await {
                                warn!(%addr, error = %err, "connection terminated with error");
                            }
                            if let Some(mut count) = ip_counts.get_mut(&addr.ip()) {
                                *count = count.saturating_sub(1);
                            }
                        });
                    }
                    Err(err) => {
                        error!(error = %err, "accept failed");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("game port accept loop stopping");
                break;
            }
        }
    }
    Ok(())
}

/// Extracts the plugin namespace from the WebSocket handshake path, e.g.
/// `/lightcycles` routes the connection's frames to the `lightcycles`
/// plugin (spec §3, "one namespace per registered plugin").
fn namespace_of(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    hub: Arc<ConnectionHub>,
    lifecycle: Arc<LifecycleCoordinator>,
    allocator: Arc<ConnectionIdAllocator>,
    security: Arc<SecurityConfig>,
) -> Result<(), ServerError> {
    let namespace_slot = Arc::new(StdMutex::new(String::new()));
    let namespace_cb = namespace_slot.clone();
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        move |req: &Request, response: Response| {
            *namespace_cb.lock().unwrap() = namespace_of(req.uri().path());
            Ok(response)
        },
    )
    .await
    .map_err(|e| ServerError::Network(format!("handshake with {addr} failed: {e}")))?;
    let namespace = namespace_slot.lock().unwrap().clone();

    if input_validation::validate_namespace(&namespace).is_err() {
        debug!(%addr, %namespace, "rejecting handshake, invalid namespace");
        return Err(ServerError::Network(format!("invalid namespace: {namespace}")));
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = allocator.next();
    hub.register(connection_id, tx.clone());
    debug!(%connection_id, %addr, %namespace, "connection established");

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch_frame(&lifecycle, &hub, &namespace, connection_id, &text, &security).await;
            }
            Ok(Message::Ping(data)) => {
                let _ = tx.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                debug!(%connection_id, "client requested close");
                break;
            }
            Err(err) => {
                debug!(%connection_id, error = %err, "websocket error, closing connection");
                break;
            }
            _ => {}
        }
    }

    hub.unregister(connection_id);
    lifecycle.handle_disconnect(connection_id).await;
    write_task.abort();
    Ok(())
}

async fn dispatch_frame(
    lifecycle: &Arc<LifecycleCoordinator>,
    hub: &Arc<ConnectionHub>,
    namespace: &str,
    connection_id: hearth_core::ConnectionId,
    text: &str,
    security: &SecurityConfig,
) {
    let value = match input_validation::validate_json_message(text.as_bytes(), security) {
        Ok(value) => value,
        Err(err) => {
            debug!(%connection_id, error = %err, "dropping frame that failed payload validation");
            return;
        }
    };
    let frame: InboundFrame = match serde_json::from_value(value) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(%connection_id, error = %err, "dropping malformed frame");
            return;
        }
    };
    if input_validation::validate_event_name(&frame.event).is_err() {
        debug!(%connection_id, event = %frame.event, "dropping frame with invalid event name");
        return;
    }

    if let Err(err) = route_event(lifecycle, namespace, connection_id, &frame.event, frame.payload).await {
        hub.send_to_connection(
            connection_id,
            "error",
            json!({ "code": err.code(), "message": err.to_string() }),
        )
        .await;
    }
}

/// Maps a wire event name to its `LifecycleCoordinator` handler (spec §6,
/// "Wire protocol"). Events starting with `webrtc:` are relayed verbatim;
/// anything else unrecognized falls through to the plugin-event path.
async fn route_event(
    lifecycle: &Arc<LifecycleCoordinator>,
    namespace: &str,
    connection_id: hearth_core::ConnectionId,
    event: &str,
    payload: Value,
) -> Result<(), LifecycleError> {
    match event {
        "room:create" => lifecycle.handle_room_create(namespace, connection_id, payload).await,
        "room:join" => lifecycle.handle_room_join(namespace, connection_id, payload).await,
        "room:leave" => lifecycle.handle_room_leave(connection_id).await,
        "chat:message" => lifecycle.handle_chat_message(connection_id, payload).await,
        "mobile-heartbeat" => {
            lifecycle.handle_mobile_heartbeat(connection_id).await;
            Ok(())
        }
        "game:sync-state" => lifecycle.handle_sync_state(connection_id, payload).await,
        "platform:return" => lifecycle.handle_platform_return(connection_id, payload).await,
        _ if event.starts_with("webrtc:") => {
            lifecycle.handle_webrtc_relay(connection_id, event, payload).await;
            Ok(())
        }
        _ => lifecycle.handle_plugin_event(connection_id, event, payload).await,
    }
}
