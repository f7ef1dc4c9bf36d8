//! Peer Session Bridge
//!
//! Correlates BGP wire connections with sessions requested by clients:
//! the [`SessionRegistry`] holds one [`PeerSession`] per peer key, the
//! [`Adapter`] feeds engine callbacks into the matching session, and each
//! session's event loop drives keepalives and outbound routes.
mod adapter;
mod peer;
mod registry;

pub use adapter::Adapter;
pub use peer::PeerSession;
pub use registry::{RegistryError, SessionRegistry};

use std::error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::broadcast;

use crate::models::{CreateRequest, Packet, PeerKey};

/// Cadence of outbound KEEPALIVEs, independent of the negotiated hold time
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Capacity of each session queue
pub const QUEUE_CAPACITY: usize = 512;

#[derive(Debug)]
pub enum BridgeError {
    /// Create request couldn't be turned into a peer key. [reason]
    InvalidRequest(String),
    Registry(RegistryError),
    /// A wire connection is already bound to this session. [key]
    AlreadyBound(PeerKey),
    /// Session queue is full. [key]
    QueueFull(PeerKey),
    /// Session is no longer running
    SessionEnded,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BridgeError::*;
        match self {
            InvalidRequest(reason) => write!(f, "{}", reason),
            Registry(err) => write!(f, "{}", err),
            AlreadyBound(key) => write!(f, "Session for {} is already connected", key),
            QueueFull(key) => write!(f, "Session for {} is busy, try again", key),
            SessionEnded => write!(f, "session has ended"),
        }
    }
}

impl error::Error for BridgeError {}

impl From<RegistryError> for BridgeError {
    fn from(error: RegistryError) -> Self {
        BridgeError::Registry(error)
    }
}

/// Entry point shared by the client transport and the BGP engine
#[derive(Clone, Default)]
pub struct Bridge {
    registry: SessionRegistry,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Engine callbacks bound to this bridge's sessions
    pub fn adapter(&self) -> Adapter {
        Adapter::new(self.registry.clone())
    }

    /// Register a session for the requested peer and start its event loop
    ///
    /// The returned receiver is subscribed before the loop starts, so it sees every packet.
    pub async fn create_session(
        &self,
        request: &CreateRequest,
    ) -> Result<(Arc<PeerSession>, broadcast::Receiver<Packet>), BridgeError> {
        let key = request
            .to_key()
            .map_err(|err| BridgeError::InvalidRequest(err.to_string()))?;
        let local_asn = request.local_asn;
        let session = self
            .registry
            .create(key, || PeerSession::new(key, local_asn))
            .await?;
        debug!("Created {}", session);
        let packets = session.subscribe();
        tokio::spawn(Arc::clone(&session).run(self.registry.clone()));
        Ok((session, packets))
    }
}
