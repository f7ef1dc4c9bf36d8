use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bgp_rs::{Notification, Update};
use log::{debug, info, warn};

use super::{PeerSession, SessionRegistry};
use crate::engine::{EngineHandler, OpenDecision, WireConnection};
use crate::models::{FsmState, FsmUpdate, Packet, PeerKey};
use crate::translate::decode;

/// Engine callbacks, dispatched to the session registered for each wire peer
///
/// Handlers only do a registry lookup and non-blocking enqueues.
#[derive(Clone)]
pub struct Adapter {
    registry: SessionRegistry,
}

impl Adapter {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    fn key_for(conn: &WireConnection) -> PeerKey {
        PeerKey::new(conn.remote().ip(), conn.peer_asn())
    }

    /// The session this connection is bound to, if any
    async fn session_for(&self, conn: &WireConnection) -> Option<Arc<PeerSession>> {
        let key = Self::key_for(conn);
        match self.registry.lookup(&key).await {
            Ok(session) if session.is_bound_to(conn) => Some(session),
            Ok(_) => {
                debug!("[{}] Ignoring event from unbound {}", key, conn);
                None
            }
            Err(err) => {
                warn!("[{}] {} ({})", key, err, conn);
                None
            }
        }
    }
}

#[async_trait]
impl EngineHandler for Adapter {
    async fn new_neighbor(&self, remote: SocketAddr) {
        debug!("[{}] New neighbor connected", remote);
    }

    async fn open_received(&self, conn: &WireConnection) -> OpenDecision {
        let key = Self::key_for(conn);
        let session = match self.registry.lookup(&key).await {
            Ok(session) => session,
            Err(_) => {
                info!("[{}] Rejecting peer, no session requested", key);
                return OpenDecision::Reject;
            }
        };
        match session.bind(conn.clone()) {
            Ok(()) => OpenDecision::Accept {
                local_asn: session.local_asn(),
            },
            Err(err) => {
                warn!("[{}] Rejecting {}: {}", key, conn, err);
                OpenDecision::Reject
            }
        }
    }

    async fn open_sent(&self, conn: &WireConnection) {
        if let Some(session) = self.session_for(conn).await {
            session.emit(Packet::fsm(FsmState::OpenSent));
        }
    }

    async fn established(&self, conn: &WireConnection) {
        if let Some(session) = self.session_for(conn).await {
            info!(
                "[{}] Session established (hold time {})",
                session.key(),
                conn.hold_timer()
            );
            session.emit(Packet::FsmUpdate(FsmUpdate::established(conn.hold_timer())));
        }
    }

    async fn update_received(&self, conn: &WireConnection, update: Update) {
        if let Some(session) = self.session_for(conn).await {
            let routes = decode(&update);
            debug!(
                "[{}] Received UPDATE ({} announced, {} withdrawn)",
                session.key(),
                routes.announcements.len(),
                routes.withdrawals.len()
            );
            session.emit(Packet::RouteData(routes));
            session.emit(Packet::event("recv-update"));
        }
    }

    async fn keepalive_received(&self, conn: &WireConnection) {
        if let Some(session) = self.session_for(conn).await {
            session.keepalive_received();
        }
    }

    async fn notification_received(&self, conn: &WireConnection, notification: &Notification) {
        info!(
            "[{}] NOTIFICATION received: {}",
            Self::key_for(conn),
            notification
        );
    }

    async fn disconnected(&self, conn: &WireConnection) {
        if let Some(session) = self.session_for(conn).await {
            info!("[{}] Wire connection closed", session.key());
            session.cancel();
        }
    }
}
