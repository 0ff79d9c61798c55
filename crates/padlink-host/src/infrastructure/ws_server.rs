//! WebSocket server: accept loop and per-session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Validating `/ws/{playerId}?layout={name}` during the HTTP upgrade and
//!    answering `400 Bad Request` when it is malformed.
//! 3. Opening a [`Session`] through the [`SessionManager`]; an unknown or
//!    empty layout is refused with Close code 1008.
//! 4. Feeding each text frame to the session until the phone disconnects or
//!    the host halts.
//! 5. On exit: halting all sessions, waiting for them to clean up, and
//!    releasing every key that is still down.
//!
//! # Scalability
//!
//! Each phone runs in its own Tokio task.  The accept loop never blocks on a
//! session: it spawns the task and goes straight back to `accept()`.  Tasks
//! share nothing but the [`SessionManager`] (and through it the key
//! multiplexer).
//!
//! # Shutdown
//!
//! Two things stop the loop: the shared `running` flag (cleared by Ctrl+C in
//! `main.rs`) and the manager's halt signal (raised by a fatal device error).
//! The loop polls both between short `accept()` timeouts.
//!
//! # Liveness (for beginners)
//!
//! A phone that drops off Wi-Fi sends no FIN or RST, so its socket simply goes
//! quiet and a read would wait forever while its keys stay down.  Each
//! session therefore pings its phone every `ping_interval`.  Any frame counts
//! as a sign of life, including the Pong the phone's WebSocket stack sends
//! back automatically.  After `liveness_timeout` of silence the session is
//! treated as disconnected and cleaned up like any other disconnect.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{
    handshake::server::{ErrorResponse, Request, Response},
    http::StatusCode,
    protocol::{frame::coding::CloseCode, CloseFrame},
    Error as WsError, Message as WsMessage,
};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::application::{RejectReason, Session, SessionError, SessionManager};
use crate::domain::{ConnectError, ConnectRequest, HostConfig};

/// Close reason sent when the requested layout cannot be used.
pub const LAYOUT_REJECTED_REASON: &str = "Layout not found or invalid";

/// Floor for the ping period; `tokio::time::interval` rejects zero.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);

/// How long sessions get to clean up after a halt before they are aborted.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is cleared or the
/// host halts.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound, if a fatal device
/// error halted the host, or if keys could not be released on the way out.
pub async fn run_server(
    config: HostConfig,
    manager: Arc<SessionManager>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!(
        "padlink host listening on ws://{}/ws/{{player}}?layout={{name}}",
        config.bind_addr
    );

    serve(listener, manager, running, &config).await
}

/// Runs the accept loop on an already bound listener.
///
/// `config.bind_addr` is ignored; everything else applies.
///
/// # Errors
///
/// See [`run_server`].
pub async fn serve(
    listener: TcpListener,
    manager: Arc<SessionManager>,
    running: Arc<AtomicBool>,
    config: &HostConfig,
) -> anyhow::Result<()> {
    let liveness = Liveness::from(config);
    let mut sessions = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }
        if manager.is_halted() {
            warn!("host halted; stopping accept loop");
            break;
        }

        match timeout(config.halt_poll_interval, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                sessions.spawn(handle_connection(
                    stream,
                    peer_addr,
                    Arc::clone(&manager),
                    liveness,
                ));
            }
            Ok(Err(e)) => {
                // Transient (e.g. too many open files); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }

        // Reap finished session tasks.
        while sessions.try_join_next().is_some() {}
    }

    manager.halt();
    let drained = timeout(SESSION_DRAIN_TIMEOUT, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("sessions did not stop within {SESSION_DRAIN_TIMEOUT:?}; aborting them");
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}
    }

    let released = manager.multiplexer().release_everything();

    if let Some(fatal) = manager.fatal_error() {
        return Err(anyhow::Error::new(fatal).context("virtual keyboard failed; host halted"));
    }
    released.context("failed to release keys on shutdown")?;

    info!("all sessions closed and keys released");
    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Per-session heartbeat settings.
#[derive(Debug, Clone, Copy)]
struct Liveness {
    ping_interval: Duration,
    timeout: Duration,
}

impl From<&HostConfig> for Liveness {
    fn from(config: &HostConfig) -> Self {
        Self {
            ping_interval: config.ping_interval.max(MIN_PING_INTERVAL),
            timeout: config.liveness_timeout,
        }
    }
}

/// Wraps [`run_connection`] and logs the outcome.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    manager: Arc<SessionManager>,
    liveness: Liveness,
) {
    match run_connection(stream, peer_addr, &manager, liveness).await {
        Ok(()) => debug!("connection {peer_addr} finished"),
        Err(e) => warn!("connection {peer_addr} ended with error: {e:#}"),
    }
}

/// Why the frame loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Disconnected,
    TimedOut,
    Halted,
}

async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    manager: &SessionManager,
    liveness: Liveness,
) -> anyhow::Result<()> {
    // ── Connecting: validate the request target during the upgrade ────────────
    let mut parsed: Option<ConnectRequest> = None;
    let callback = |req: &Request, response: Response| {
        let target = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
        match ConnectRequest::parse(target) {
            Ok(request) => {
                parsed = Some(request);
                Ok(response)
            }
            Err(e) => {
                info!("rejecting {peer_addr} ({target}): {e}");
                Err(bad_request(&e))
            }
        }
    };
    let handshake = accept_hdr_async(stream, callback).await;

    let mut ws = match handshake {
        Ok(ws) => ws,
        // Already answered with 400 and logged by the callback.
        Err(WsError::Http(_)) => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("WebSocket handshake failed with {peer_addr}"))
        }
    };
    let Some(request) = parsed else {
        return Ok(());
    };

    let mut session = match manager.open(request).await {
        Ok(session) => session,
        Err(e) => {
            info!("rejecting {peer_addr}: {e}");
            send_close(&mut ws, close_frame_for(&e)).await;
            return Ok(());
        }
    };

    // ── Active: one frame at a time, until disconnect or halt ─────────────────
    let exit = frame_loop(&mut ws, &mut session, manager, liveness).await;

    match exit {
        LoopExit::Halted => {
            send_close(
                &mut ws,
                CloseFrame {
                    code: CloseCode::Away,
                    reason: "Host shutting down".into(),
                },
            )
            .await;
        }
        LoopExit::TimedOut => {
            info!(
                "session {}: no frames from {peer_addr} for {:?}; dropping it",
                session.id(),
                liveness.timeout
            );
        }
        LoopExit::Disconnected => {}
    }

    // ── Closing ───────────────────────────────────────────────────────────────
    manager.end(session);
    Ok(())
}

async fn frame_loop(
    ws: &mut WebSocketStream<TcpStream>,
    session: &mut Session,
    manager: &SessionManager,
    liveness: Liveness,
) -> LoopExit {
    let mut halt = manager.subscribe_halt();
    let id = session.id();
    let mut heartbeat = interval_at(
        Instant::now() + liveness.ping_interval,
        liveness.ping_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        if *halt.borrow_and_update() {
            return LoopExit::Halted;
        }

        tokio::select! {
            changed = halt.changed() => {
                if changed.is_err() {
                    return LoopExit::Halted;
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() >= liveness.timeout {
                    return LoopExit::TimedOut;
                }
                if let Err(e) = ws.send(WsMessage::Ping(Vec::new())).await {
                    debug!("session {id}: ping failed: {e}");
                    return LoopExit::Disconnected;
                }
            }
            frame = ws.next() => {
                last_seen = Instant::now();
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                        debug!("session {id}: stream ended");
                        return LoopExit::Disconnected;
                    }
                    Some(Err(e)) => {
                        debug!("session {id}: WebSocket error: {e}");
                        return LoopExit::Disconnected;
                    }
                };

                match message {
                    WsMessage::Text(text) => {
                        if let Err(e) = session.handle_text(&text) {
                            if manager.escalate(&e) {
                                return LoopExit::Halted;
                            }
                            log_contained(id, &e);
                        }
                    }
                    WsMessage::Binary(data) => {
                        warn!("session {id}: protocol violation: binary frame ({} bytes) dropped", data.len());
                    }
                    WsMessage::Close(_) => {
                        debug!("session {id}: Close frame received");
                        return LoopExit::Disconnected;
                    }
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {
                        // Pongs are queued by tungstenite itself.
                    }
                }
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn log_contained(id: uuid::Uuid, error: &SessionError) {
    match error {
        SessionError::UnresolvedKeybind(e) => debug!("session {id}: event dropped: {e}"),
        other => warn!("session {id}: {other}"),
    }
}

fn bad_request(reason: &ConnectError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

fn close_frame_for(error: &SessionError) -> CloseFrame<'static> {
    match error {
        SessionError::ConnectionRejected(RejectReason::ShuttingDown) => CloseFrame {
            code: CloseCode::Away,
            reason: "Host shutting down".into(),
        },
        _ => CloseFrame {
            code: CloseCode::Policy,
            reason: LAYOUT_REJECTED_REASON.into(),
        },
    }
}

async fn send_close(ws: &mut WebSocketStream<TcpStream>, frame: CloseFrame<'static>) {
    if let Err(e) = ws.close(Some(frame)).await {
        debug!("failed to send Close frame: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
