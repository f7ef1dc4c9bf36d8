//! BGP Protocol Engine
//!
//! Listens for BGP peers, frames and parses messages and runs a passive
//! FSM per TCP connection. Everything beyond the wire (who may peer, what
//! to do with routes) is delegated to an [`EngineHandler`].
mod codec;
mod connection;
mod hold_timer;
mod message_counts;
mod open;

pub use codec::{MessageCodec, MessageProtocol};
pub use connection::WireConnection;
pub use open::{asn_from_open, create_open};

use std::error;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bgp_rs::{Notification, Update};
use log::{debug, info, warn};
use tokio::net::TcpListener;

/// Hold time offered in our OPEN, the session uses min(peer, local)
pub const HOLD_TIME: u16 = 180;
/// Time allowed for a new connection to send its OPEN
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(30);
/// Capacity of each connection's outbound message queue
pub const OUTBOUND_CAPACITY: usize = 512;

/// What to do with a connection after its OPEN was received
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpenDecision {
    /// Continue session setup, advertising `local_asn` in our OPEN
    Accept { local_asn: u32 },
    /// Send Cease/Connection Rejected and close
    Reject,
}

/// Callbacks from the engine, invoked from each connection's task
///
/// Implementations must not block: they are awaited inline by the
/// connection that raised them.
#[async_trait]
pub trait EngineHandler: Send + Sync + 'static {
    /// A TCP connection was accepted, nothing is known about the peer yet
    async fn new_neighbor(&self, _remote: SocketAddr) {}
    async fn open_received(&self, conn: &WireConnection) -> OpenDecision;
    async fn open_sent(&self, conn: &WireConnection);
    async fn established(&self, conn: &WireConnection);
    async fn update_received(&self, conn: &WireConnection, update: Update);
    async fn keepalive_received(&self, conn: &WireConnection);
    async fn notification_received(&self, conn: &WireConnection, notification: &Notification);
    /// Called exactly once for every connection whose OPEN was accepted
    async fn disconnected(&self, conn: &WireConnection);
}

#[derive(Debug)]
pub enum SessionError {
    /// No session is waiting for this peer
    Rejected,
    /// Session was torn down locally
    Deconfigured,
    /// Peer speaks an unsupported BGP version. [version]
    UnsupportedVersion(u8),
    /// Finite State Machine error, unexpected transition [minor_err_codes]
    FiniteStateMachine(u8),
    /// Hold time expired. [interval]
    HoldTimeExpired(u16),
    /// Peer sent a NOTIFICATION
    PeerNotification(u8, u8),
    /// Outbound queue can't take more messages
    QueueFull,
    /// Something happened in transport. [reason]
    TransportError(String),
    /// Some other issue happened. [reason]
    Other(String),
}

impl SessionError {
    /// NOTIFICATION (major, minor) codes to send the peer before closing, if any
    pub fn notification_codes(&self) -> Option<(u8, u8)> {
        use SessionError::*;
        match self {
            Rejected => Some((6, 5)),
            Deconfigured => Some((6, 3)),
            UnsupportedVersion(_) => Some((2, 1)),
            FiniteStateMachine(minor) => Some((5, *minor)),
            HoldTimeExpired(_) => Some((4, 0)),
            PeerNotification(_, _) | QueueFull | TransportError(_) | Other(_) => None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Session Error: ")?;
        use SessionError::*;
        match self {
            Rejected => write!(f, "No session registered for peer")?,
            Deconfigured => write!(f, "Peer De-configured")?,
            UnsupportedVersion(v) => write!(f, "Unsupported BGP version {}", v)?,
            FiniteStateMachine(minor) => write!(f, "Finite State Machine err [{}]", minor)?,
            HoldTimeExpired(h) => write!(f, "Hold time expired after {} seconds", h)?,
            PeerNotification(maj, min) => write!(f, "Peer sent NOTIFICATION [{}/{}]", maj, min)?,
            QueueFull => write!(f, "Outbound queue is full")?,
            TransportError(r) => write!(f, "Transport error [{}]", r)?,
            Other(r) => write!(f, "{}", r)?,
        }
        Ok(())
    }
}

impl From<io::Error> for SessionError {
    fn from(error: io::Error) -> Self {
        SessionError::TransportError(error.to_string())
    }
}

impl error::Error for SessionError {}

/// Passive BGP listener
pub struct Engine {
    listener: TcpListener,
    router_id: Ipv4Addr,
}

impl Engine {
    pub async fn bind(addr: SocketAddr, router_id: Ipv4Addr) -> Result<Self, io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("BGP listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            router_id,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task per connection
    pub async fn serve<H: EngineHandler>(self, handler: Arc<H>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    debug!("[{}] Incoming TCP connection", remote);
                    let handler = Arc::clone(&handler);
                    let router_id = self.router_id;
                    tokio::spawn(async move {
                        connection::handle(stream, remote, router_id, handler).await;
                    });
                }
                Err(err) => warn!("Error accepting BGP connection: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_codes() {
        assert_eq!(SessionError::Rejected.notification_codes(), Some((6, 5)));
        assert_eq!(SessionError::Deconfigured.notification_codes(), Some((6, 3)));
        assert_eq!(
            SessionError::HoldTimeExpired(90).notification_codes(),
            Some((4, 0))
        );
        assert_eq!(
            SessionError::TransportError("reset".to_string()).notification_codes(),
            None
        );
    }
}
