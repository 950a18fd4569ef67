//! WebSocket stream manager.
//!
//! One shared connection per `StreamManager`. The connection is opened
//! lazily by the first `subscribe`, reconnected with backoff when it drops,
//! and torn down when the last tick listener goes away.
//!
//! Ordering guarantees:
//! - On open, every desired symbol is queued for replay before the state
//!   flips to `Connected`, so any frame queued afterwards follows the replay.
//! - A `ping` is answered on the read path before the next frame is read.
//! - Trades of one frame are delivered one at a time, in wire order, to the
//!   listeners registered at the moment each trade is dispatched.

use crate::dispatch::{dispatch_isolated, ListenerId, ListenerRegistry, StateListener, TickListener};
use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{decode_frame, InboundFrame, OutboundFrame};
use crate::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::subscription::SubscriptionSet;
use crate::tracker::QuoteTracker;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickwatch_core::{Symbol, Trade};
use tickwatch_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Authenticated WebSocket URL.
    pub url: String,
    /// Bound on each connect attempt (handshake included).
    pub connection_timeout_ms: u64,
    /// Backoff policy between attempts.
    pub reconnect: ReconnectConfig,
    /// Reconnect when no frame arrives for this long (0 = disabled).
    pub idle_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connection_timeout_ms: 10_000,
            reconnect: ReconnectConfig::default(),
            idle_timeout_ms: 0,
        }
    }
}

/// Build the endpoint URL carrying the API token.
pub fn build_authenticated_url(base_url: &str, token: &str) -> WsResult<String> {
    if token.trim().is_empty() {
        return Err(WsError::Config("market-data API token is required".to_string()));
    }
    let separator = if base_url.contains('?') { '&' } else { '?' };
    Ok(format!("{base_url}{separator}token={}", token.trim()))
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connection lifetime: from first subscribe to teardown or give-up.
struct Session {
    id: u64,
    outbound_tx: mpsc::UnboundedSender<OutboundFrame>,
    shutdown: CancellationToken,
}

/// Mutable state serialized behind one lock.
struct Registry {
    symbols: SubscriptionSet,
    tick_listeners: ListenerRegistry<dyn TickListener>,
    state_listeners: ListenerRegistry<StateListener>,
    session: Option<Session>,
}

impl Registry {
    fn is_current(&self, session_id: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session_id)
    }
}

struct Shared {
    config: ConnectionConfig,
    registry: Mutex<Registry>,
    state: RwLock<ConnectionState>,
    /// Held from state snapshot to the end of a state dispatch, so a
    /// listener never sees an older state after a newer one.
    /// Taken before `registry`.
    state_dispatch: ReentrantMutex<()>,
    tracker: QuoteTracker,
    next_session_id: AtomicU64,
}

/// Shared market-data stream.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct StreamManager {
    shared: Arc<Shared>,
}

impl StreamManager {
    /// Create a manager. No connection is opened until the first `subscribe`.
    pub fn new(config: ConnectionConfig) -> WsResult<Self> {
        if config.url.trim().is_empty() {
            return Err(WsError::Config("stream URL is empty".to_string()));
        }
        if config.connection_timeout_ms == 0 {
            return Err(WsError::Config("connection timeout must be positive".to_string()));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                registry: Mutex::new(Registry {
                    symbols: SubscriptionSet::new(),
                    tick_listeners: ListenerRegistry::new(),
                    state_listeners: ListenerRegistry::new(),
                    session: None,
                }),
                state: RwLock::new(ConnectionState::Disconnected),
                state_dispatch: ReentrantMutex::new(()),
                tracker: QuoteTracker::new(),
                next_session_id: AtomicU64::new(1),
            }),
        })
    }

    /// Register a tick listener for `symbols`.
    ///
    /// Opens the connection if none exists. New symbols are sent right away
    /// when connected, otherwise on the next open. Dropping or calling
    /// `unsubscribe` on the returned handle removes the listener; removing
    /// the last one closes the connection and clears all state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<I, S, L>(&self, symbols: I, listener: L) -> WsResult<TickSubscription>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        L: TickListener + 'static,
    {
        let symbols = symbols
            .into_iter()
            .map(Symbol::new)
            .collect::<Result<Vec<_>, _>>()?;

        let id = {
            let mut registry = self.shared.registry.lock();
            let id = registry.tick_listeners.insert(Arc::new(listener));
            self.shared.ensure_session(&mut registry);

            let connected = self.shared.state.read().is_connected();
            for symbol in symbols {
                if !registry.symbols.insert(symbol.clone()) {
                    continue;
                }
                if connected {
                    self.shared
                        .enqueue(&registry, OutboundFrame::Subscribe { symbol });
                } else {
                    debug!(symbol = %symbol, "Not connected, subscription deferred to next open");
                }
            }
            id
        };

        Ok(TickSubscription {
            shared: self.shared.clone(),
            id,
            active: true,
        })
    }

    /// Register a connection-state listener.
    ///
    /// Called immediately with the current state, then on every
    /// connected/disconnected transition. The immediate call may repeat
    /// the value of a transition that raced with registration; the last
    /// value a listener receives is always the latest state.
    pub fn on_connection_state_change<F>(&self, listener: F) -> StateSubscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let listener: Arc<StateListener> = Arc::new(listener);
        let _dispatch = self.shared.state_dispatch.lock();
        let (id, connected) = {
            let mut registry = self.shared.registry.lock();
            let id = registry.state_listeners.insert(listener.clone());
            (id, self.shared.state.read().is_connected())
        };

        dispatch_isolated(&[listener], "state", |l| {
            l(connected);
            Ok(())
        });

        StateSubscription {
            shared: self.shared.clone(),
            id,
            active: true,
        }
    }

    /// Send an unsubscribe frame and forget the symbol.
    ///
    /// Returns `false` if the symbol was not subscribed.
    pub fn unsubscribe_symbol(&self, symbol: impl AsRef<str>) -> WsResult<bool> {
        let symbol = Symbol::new(symbol)?;
        let mut registry = self.shared.registry.lock();
        if !registry.symbols.remove(&symbol) {
            return Ok(false);
        }
        if self.is_connected() {
            self.shared
                .enqueue(&registry, OutboundFrame::Unsubscribe { symbol });
        }
        Ok(true)
    }

    /// Point-in-time connection snapshot.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Symbols currently desired.
    pub fn subscribed_symbols(&self) -> Vec<Symbol> {
        self.shared.registry.lock().symbols.replay()
    }

    pub fn tick_listener_count(&self) -> usize {
        self.shared.registry.lock().tick_listeners.len()
    }

    /// Whether a connection session (connected or retrying) exists.
    pub fn has_session(&self) -> bool {
        self.shared.registry.lock().session.is_some()
    }

    /// Remove every listener and close the connection.
    pub fn shutdown(&self) {
        let mut registry = self.shared.registry.lock();
        registry.tick_listeners.clear();
        self.shared.teardown(&mut registry);
    }
}

impl Shared {
    /// Start a session task if none is running. Caller holds the lock.
    fn ensure_session(self: &Arc<Self>, registry: &mut Registry) {
        if registry.session.is_some() {
            return;
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        registry.session = Some(Session {
            id,
            outbound_tx,
            shutdown: shutdown.clone(),
        });
        *self.state.write() = ConnectionState::Connecting;

        info!(session_id = id, "Starting stream session");
        tokio::spawn(self.clone().run_session(id, outbound_rx, shutdown));
    }

    /// Queue a frame on the current session. Caller holds the lock.
    fn enqueue(&self, registry: &Registry, frame: OutboundFrame) {
        if let Some(session) = &registry.session {
            debug!(kind = frame.kind(), "Queueing outbound frame");
            if session.outbound_tx.send(frame).is_err() {
                debug!("Session writer gone, frame dropped");
            }
        }
    }

    fn remove_tick_listener(&self, id: ListenerId) {
        let mut registry = self.registry.lock();
        if !registry.tick_listeners.remove(id) {
            return;
        }
        if registry.tick_listeners.is_empty() {
            self.teardown(&mut registry);
        }
    }

    fn remove_state_listener(&self, id: ListenerId) {
        self.registry.lock().state_listeners.remove(id);
    }

    /// Close the connection and clear all subscription and listener state.
    fn teardown(&self, registry: &mut Registry) {
        if let Some(session) = registry.session.take() {
            session.shutdown.cancel();
            info!(session_id = session.id, "Last listener removed, stream torn down");
        }
        registry.symbols.clear();
        registry.tick_listeners.clear();
        registry.state_listeners.clear();
        *self.state.write() = ConnectionState::Disconnected;
        Metrics::ws_disconnected();
    }

    /// Apply a state change from a session task and notify on
    /// connected/disconnected transitions. Stale sessions are ignored.
    fn transition(&self, session_id: u64, next: ConnectionState) {
        let _dispatch = self.state_dispatch.lock();
        let (changed, listeners) = {
            let registry = self.registry.lock();
            if !registry.is_current(session_id) {
                return;
            }
            let mut state = self.state.write();
            let changed = state.is_connected() != next.is_connected();
            *state = next;
            (changed, registry.state_listeners.snapshot())
        };

        if changed {
            self.notify_state(&listeners, next.is_connected());
        }
    }

    /// Replay every desired symbol, then mark the session connected.
    fn on_open(&self, session_id: u64) {
        let _dispatch = self.state_dispatch.lock();
        let listeners = {
            let registry = self.registry.lock();
            if !registry.is_current(session_id) {
                return;
            }
            let replay = registry.symbols.replay();
            info!(count = replay.len(), "Replaying subscriptions");
            for symbol in replay {
                self.enqueue(&registry, OutboundFrame::Subscribe { symbol });
            }
            *self.state.write() = ConnectionState::Connected;
            registry.state_listeners.snapshot()
        };

        self.notify_state(&listeners, true);
    }

    /// Forget a session that gave up reconnecting. Desired symbols are kept
    /// so the next `subscribe` replays them on a fresh session.
    fn release_session(&self, session_id: u64) {
        let mut registry = self.registry.lock();
        if registry.is_current(session_id) {
            registry.session = None;
            *self.state.write() = ConnectionState::Disconnected;
        }
    }

    fn notify_state(&self, listeners: &[Arc<StateListener>], connected: bool) {
        if connected {
            Metrics::ws_connected();
        } else {
            Metrics::ws_disconnected();
        }
        dispatch_isolated(listeners, "state", |l| {
            l(connected);
            Ok(())
        });
    }

    /// Fan out each trade, one at a time, to the current tick listeners.
    fn dispatch_trades(&self, session_id: u64, trades: &[Trade]) {
        for trade in trades {
            let quote = self.tracker.observe(trade);
            Metrics::tick_received(quote.symbol.as_str());

            let listeners = {
                let registry = self.registry.lock();
                if !registry.is_current(session_id) {
                    return;
                }
                registry.tick_listeners.snapshot()
            };
            dispatch_isolated(&listeners, "tick", |l| l.on_tick(&quote));
        }
    }

    async fn run_session(
        self: Arc<Self>,
        session_id: u64,
        mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
        shutdown: CancellationToken,
    ) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let heartbeat = HeartbeatMonitor::new(self.config.idle_timeout_ms);

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.transition(session_id, ConnectionState::Connecting);

            let result = self
                .connect_and_stream(
                    session_id,
                    &mut outbound_rx,
                    &shutdown,
                    &mut policy,
                    &heartbeat,
                )
                .await;

            self.transition(session_id, ConnectionState::Disconnected);

            if shutdown.is_cancelled() {
                break;
            }

            let reason = match &result {
                Ok(()) => "closed",
                Err(e) if e.is_transport() => {
                    warn!(error = %e, "WebSocket connection lost");
                    e.reason()
                }
                Err(e) => {
                    error!(error = %e, "WebSocket session failed");
                    e.reason()
                }
            };

            let Some(delay) = policy.next_delay() else {
                error!(
                    attempts = policy.attempts(),
                    "Max reconnection attempts reached, giving up"
                );
                self.release_session(session_id);
                break;
            };

            Metrics::ws_reconnect(reason);
            warn!(
                attempt = policy.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => break,
            }
        }

        debug!(session_id, "Stream session exited");
    }

    async fn connect_and_stream(
        &self,
        session_id: u64,
        outbound_rx: &mut mpsc::UnboundedReceiver<OutboundFrame>,
        shutdown: &CancellationToken,
        policy: &mut ReconnectPolicy,
        heartbeat: &HeartbeatMonitor,
    ) -> WsResult<()> {
        debug!(session_id, "Connecting to market-data stream");

        let timeout = Duration::from_millis(self.config.connection_timeout_ms);
        let connect = tokio::time::timeout(timeout, connect_async(self.config.url.as_str()));
        let (ws_stream, _response) = tokio::select! {
            result = connect => result
                .map_err(|_| WsError::ConnectTimeout(timeout))?
                .map_err(|e| WsError::ConnectionFailed(e.to_string()))?,
            () = shutdown.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        policy.reset();
        heartbeat.reset();

        // Frames queued for the previous connection are superseded by the replay.
        while outbound_rx.try_recv().is_ok() {}

        info!(session_id, "WebSocket connected");
        self.on_open(session_id);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send Close frame during teardown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            heartbeat.record_frame();
                            match decode_frame(&text) {
                                Ok(InboundFrame::Ping) => {
                                    let pong = OutboundFrame::Pong.to_json()?;
                                    write.send(Message::Text(pong)).await?;
                                    heartbeat.record_ping_answered();
                                }
                                Ok(InboundFrame::Trades(trades)) => {
                                    self.dispatch_trades(session_id, &trades);
                                }
                                Ok(InboundFrame::Pong) => debug!("Received pong"),
                                Ok(InboundFrame::Error { message }) => {
                                    warn!(%message, "Stream reported an error");
                                }
                                Ok(InboundFrame::Unknown(kind)) => {
                                    debug!(%kind, "Dropping frame of unknown type");
                                }
                                Err(e) => {
                                    Metrics::decode_error();
                                    warn!(error = %e, raw = %text, "Dropping malformed frame");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            heartbeat.record_frame();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => heartbeat.record_frame(),
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                    }
                }

                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else {
                        // Session dropped by teardown.
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    };
                    write.send(Message::Text(frame.to_json()?)).await?;
                    Metrics::ws_frame_sent(frame.kind());
                }

                () = heartbeat.wait_for_check(), if heartbeat.is_enabled() => {
                    if heartbeat.is_idle() {
                        let stats = heartbeat.stats();
                        warn!(
                            silent_ms = stats.time_since_last_frame_ms,
                            last_frame = %stats.last_frame,
                            last_ping = ?stats.last_ping,
                            pongs_sent = stats.pongs_sent,
                            "Connection idle"
                        );
                        return Err(WsError::IdleTimeout(heartbeat.idle_timeout_ms()));
                    }
                }
            }
        }
    }
}

/// Tick-listener registration handle.
///
/// Unregisters on `unsubscribe` or drop. Removing the last listener tears
/// the stream down.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct TickSubscription {
    shared: Arc<Shared>,
    id: ListenerId,
    active: bool,
}

impl TickSubscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            self.shared.remove_tick_listener(self.id);
        }
    }
}

impl Drop for TickSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// State-listener registration handle. Unregisters on `unsubscribe` or drop.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct StateSubscription {
    shared: Arc<Shared>,
    id: ListenerId,
    active: bool,
}

impl StateSubscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            self.shared.remove_state_listener(self.id);
        }
    }
}

impl Drop for StateSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
