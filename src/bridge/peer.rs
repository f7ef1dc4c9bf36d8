use std::fmt;
use std::sync::{Arc, Mutex};

use bgp_rs::Message;
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{broadcast, OnceCell};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{BridgeError, SessionRegistry, KEEPALIVE_INTERVAL, QUEUE_CAPACITY};
use crate::engine::WireConnection;
use crate::models::{FsmState, Packet, PeerKey};
use crate::translate::{encode, RouteBatch};

/// Receiving halves of the session's input queues, owned by the event loop
struct SessionInputs {
    keepalives: mpsc::Receiver<DateTime<Utc>>,
    routes: mpsc::Receiver<RouteBatch>,
}

/// One exposed peering slot
///
/// Writers (the engine adapter and the client) only ever enqueue; the
/// event loop started by [`PeerSession::run`] is the single reader.
pub struct PeerSession {
    key: PeerKey,
    local_asn: u32,
    wire: OnceCell<WireConnection>,
    keepalives: mpsc::Sender<DateTime<Utc>>,
    routes: mpsc::Sender<RouteBatch>,
    client_tx: broadcast::Sender<Packet>,
    shutdown: CancellationToken,
    finished: CancellationToken,
    inputs: Mutex<Option<SessionInputs>>,
}

impl PeerSession {
    pub fn new(key: PeerKey, local_asn: u32) -> Self {
        let (keepalives, keepalives_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (routes, routes_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (client_tx, _) = broadcast::channel(QUEUE_CAPACITY);
        Self {
            key,
            local_asn,
            wire: OnceCell::new(),
            keepalives,
            routes,
            client_tx,
            shutdown: CancellationToken::new(),
            finished: CancellationToken::new(),
            inputs: Mutex::new(Some(SessionInputs {
                keepalives: keepalives_rx,
                routes: routes_rx,
            })),
        }
    }

    pub fn key(&self) -> PeerKey {
        self.key
    }

    pub fn local_asn(&self) -> u32 {
        self.local_asn
    }

    /// Receive everything this session reports to its client
    ///
    /// A receiver that falls more than the queue capacity behind loses the oldest packets.
    pub fn subscribe(&self) -> broadcast::Receiver<Packet> {
        self.client_tx.subscribe()
    }

    /// Report a packet to the client, never waits
    pub fn emit(&self, packet: Packet) {
        let kind = packet.kind();
        if self.client_tx.send(packet).is_err() {
            trace!("[{}] No client listening for {}", self.key, kind);
        }
    }

    /// Bind the wire connection whose OPEN matched this session, only once
    pub fn bind(&self, conn: WireConnection) -> Result<(), BridgeError> {
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::SessionEnded);
        }
        let id = conn.id();
        self.wire
            .set(conn)
            .map_err(|_| BridgeError::AlreadyBound(self.key))?;
        // Teardown may have read an empty slot while we were setting it
        if self.shutdown.is_cancelled() {
            if let Some(wire) = self.wire.get() {
                wire.disconnect();
            }
            return Err(BridgeError::SessionEnded);
        }
        debug!("[{}] Bound to wire connection {}", self.key, id);
        self.emit(Packet::fsm(FsmState::Active));
        Ok(())
    }

    /// Is `conn` the connection bound to this session (not a stale or rejected one)
    pub fn is_bound_to(&self, conn: &WireConnection) -> bool {
        self.wire.get().map(|w| w.id() == conn.id()).unwrap_or(false)
    }

    /// Queue routes to be sent to the wire peer
    pub fn queue_routes(&self, batch: RouteBatch) -> Result<(), BridgeError> {
        if self.is_cancelled() {
            return Err(BridgeError::SessionEnded);
        }
        self.routes.try_send(batch).map_err(|err| match err {
            TrySendError::Full(_) => BridgeError::QueueFull(self.key),
            TrySendError::Closed(_) => BridgeError::SessionEnded,
        })
    }

    /// Record a KEEPALIVE from the wire peer, dropped if the loop is far behind
    pub fn keepalive_received(&self) {
        if let Err(err) = self.keepalives.try_send(Utc::now()) {
            debug!("[{}] Keepalive not queued: {}", self.key, err);
        }
    }

    /// Ask the event loop to tear the session down, safe to call any number of times
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Resolves once teardown has completed
    pub async fn finished(&self) {
        self.finished.cancelled().await
    }

    /// The session's event loop, runs until cancelled then tears down
    pub async fn run(self: Arc<Self>, registry: SessionRegistry) {
        let inputs = match self.inputs.lock() {
            Ok(mut inputs) => inputs.take(),
            Err(_) => None,
        };
        let SessionInputs {
            mut keepalives,
            mut routes,
        } = match inputs {
            Some(inputs) => inputs,
            None => {
                warn!("[{}] Event loop is already running", self.key);
                return;
            }
        };

        info!("[{}] Session started (local AS{})", self.key, self.local_asn);
        self.emit(Packet::fsm(FsmState::Idle));

        let mut keepalive_timer =
            interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
        keepalive_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                _ = keepalive_timer.tick() => self.send_keepalive(),
                Some(received) = keepalives.recv() => {
                    trace!("[{}] KEEPALIVE received at {}", self.key, received);
                    self.emit(Packet::event("recv-keepalive"));
                }
                Some(batch) = routes.recv() => self.announce(batch),
            }
        }

        self.teardown(&registry).await;
    }

    fn send_keepalive(&self) {
        if let Some(wire) = self.wire.get() {
            match wire.send(Message::KeepAlive) {
                Ok(()) => self.emit(Packet::event("sent-keepalive")),
                Err(err) => warn!("[{}] Couldn't send KEEPALIVE: {}", self.key, err),
            }
        }
    }

    fn announce(&self, batch: RouteBatch) {
        if batch.is_empty() {
            debug!("[{}] Ignoring empty route batch", self.key);
            return;
        }
        let wire = match self.wire.get() {
            Some(wire) => wire,
            None => {
                warn!(
                    "[{}] Discarding routes, no wire connection yet ({} announced, {} withdrawn)",
                    self.key,
                    batch.announcements.len(),
                    batch.withdrawals.len()
                );
                return;
            }
        };
        let update = encode(&batch, wire.add_path());
        debug!(
            "[{}] Sending UPDATE ({} announced, {} withdrawn)",
            self.key,
            update.announced_routes.len(),
            update.withdrawn_routes.len()
        );
        if let Err(err) = wire.send(Message::Update(update)) {
            warn!("[{}] Couldn't send UPDATE: {}", self.key, err);
        }
    }

    async fn teardown(&self, registry: &SessionRegistry) {
        self.emit(Packet::fsm(FsmState::Idle));
        if let Some(wire) = self.wire.get() {
            wire.disconnect();
        }
        registry.remove(&self.key).await;
        self.finished.cancel();
        info!("[{}] Session ended", self.key);
    }
}

impl fmt::Display for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = match (self.is_finished(), self.wire.get()) {
            (true, _) => "ended".to_string(),
            (false, Some(wire)) => format!("bound to {}", wire),
            (false, None) => "waiting for OPEN".to_string(),
        };
        write!(f, "<PeerSession {} local AS{} {}>", self.key, self.local_asn, state)
    }
}
