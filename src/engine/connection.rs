use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bgp_rs::{Capabilities, Message, Notification, Open};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use super::codec::{MessageCodec, MessageProtocol};
use super::hold_timer::{expired, HoldTimer};
use super::message_counts::MessageCounts;
use super::open::{asn_from_open, create_open, negotiate_capabilities};
use super::{EngineHandler, OpenDecision, SessionError};
use super::{HOLD_TIME, OPEN_TIMEOUT, OUTBOUND_CAPACITY};
use crate::utils::{format_time_as_elapsed, get_message_type};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one live wire connection, given to the [`EngineHandler`]
///
/// Cheap to clone; every clone refers to the same TCP connection.
#[derive(Clone, Debug)]
pub struct WireConnection {
    id: u64,
    remote: SocketAddr,
    peer_asn: u32,
    hold_timer: u16,
    add_path: bool,
    outbound: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl WireConnection {
    /// Create a handle and the queue its messages are written to
    pub fn new(
        remote: SocketAddr,
        peer_asn: u32,
        hold_timer: u16,
        add_path: bool,
    ) -> (Self, mpsc::Receiver<Message>) {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let conn = Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            remote,
            peer_asn,
            hold_timer,
            add_path,
            outbound,
            closed: CancellationToken::new(),
        };
        (conn, outbound_rx)
    }

    /// Unique for the lifetime of the process
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// ASN from the peer's OPEN (4-byte capability preferred)
    pub fn peer_asn(&self) -> u32 {
        self.peer_asn
    }

    /// Negotiated hold time in seconds
    pub fn hold_timer(&self) -> u16 {
        self.hold_timer
    }

    /// Were ADD-PATH capabilities negotiated (NLRI carry path identifiers)
    pub fn add_path(&self) -> bool {
        self.add_path
    }

    /// Queue a message to be sent, never waits
    pub fn send(&self, message: Message) -> Result<(), SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::TransportError(
                "connection closed".to_string(),
            ));
        }
        self.outbound.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => SessionError::QueueFull,
            TrySendError::Closed(_) => {
                SessionError::TransportError("connection closed".to_string())
            }
        })
    }

    /// Close the connection (with Cease/Peer De-configured if still open)
    /// Safe to call any number of times
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl fmt::Display for WireConnection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Connection {} {} AS{}>", self.id, self.remote, self.peer_asn)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum ConnectionState {
    Connect,
    OpenConfirm,
    Established,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            ConnectionState::Connect => "Connect",
            ConnectionState::OpenConfirm => "OpenConfirm",
            ConnectionState::Established => "Established",
        };
        write!(f, "{}", word)
    }
}

// RFC 6608 FSM error subcodes
fn fsm_err_for_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Connect => 0,
        ConnectionState::OpenConfirm => 2,
        ConnectionState::Established => 3,
    }
}

/// Passive side of one TCP connection, from OPEN to teardown
struct Connection {
    addr: SocketAddr,
    state: ConnectionState,
    protocol: MessageProtocol,
    connect_time: DateTime<Utc>,
    hold_timer: HoldTimer,
    counts: MessageCounts,
    wire: Option<WireConnection>,
}

impl Connection {
    fn new(addr: SocketAddr, protocol: MessageProtocol) -> Self {
        Self {
            addr,
            state: ConnectionState::Connect,
            protocol,
            connect_time: Utc::now(),
            hold_timer: HoldTimer::new(0),
            counts: MessageCounts::new(),
            wire: None,
        }
    }

    fn update_state(&mut self, new_state: ConnectionState) {
        debug!("[{}] went from {} to {}", self.addr, self.state, new_state);
        self.state = new_state;
    }

    async fn run<H: EngineHandler>(
        &mut self,
        handler: &H,
        router_id: Ipv4Addr,
    ) -> Result<(), SessionError> {
        let open = self.receive_open().await?;
        let (wire, mut outbound) = self.negotiate(&open);
        let local_asn = match handler.open_received(&wire).await {
            OpenDecision::Reject => return Err(SessionError::Rejected),
            OpenDecision::Accept { local_asn } => local_asn,
        };
        self.wire = Some(wire.clone());

        self.send_message(Message::Open(create_open(local_asn, router_id, HOLD_TIME)))
            .await?;
        handler.open_sent(&wire).await;
        self.send_message(Message::KeepAlive).await?;
        self.update_state(ConnectionState::OpenConfirm);

        let closed = wire.closed.clone();
        loop {
            let deadline = self.hold_timer.deadline();
            let established = self.state == ConnectionState::Established;
            tokio::select! {
                _ = closed.cancelled() => return Err(SessionError::Deconfigured),
                _ = expired(deadline) => {
                    return Err(SessionError::HoldTimeExpired(self.hold_timer.hold_timer));
                }
                message = self.protocol.next() => match message {
                    // Framed stream is exhausted, remote side closed connection
                    None => {
                        return Err(SessionError::Other(format!("Session ended with {}", self.addr)));
                    }
                    Some(Err(err)) => return Err(err.into()),
                    Some(Ok(message)) => {
                        trace!("[{}] Incoming: {}", self.addr, get_message_type(&message));
                        self.counts.increment_received();
                        self.hold_timer.received();
                        self.process_message(message, &wire, handler).await?;
                    }
                },
                // Nothing goes out ahead of the peer's KEEPALIVE
                Some(message) = outbound.recv(), if established => {
                    self.send_message(message).await?;
                }
            }
        }
    }

    async fn receive_open(&mut self) -> Result<Open, SessionError> {
        match timeout(OPEN_TIMEOUT, self.protocol.next()).await {
            Err(_) => Err(SessionError::HoldTimeExpired(OPEN_TIMEOUT.as_secs() as u16)),
            Ok(None) => Err(SessionError::Other(format!(
                "Connection from {} closed before OPEN",
                self.addr
            ))),
            Ok(Some(Err(err))) => Err(err.into()),
            Ok(Some(Ok(Message::Open(open)))) => {
                self.counts.increment_received();
                if open.version != 4 {
                    return Err(SessionError::UnsupportedVersion(open.version));
                }
                debug!(
                    "[{}] Received OPEN [w/ {} params]",
                    self.addr,
                    open.parameters.len()
                );
                Ok(open)
            }
            Ok(Some(Ok(other))) => {
                warn!(
                    "[{}] Expected OPEN, received {}",
                    self.addr,
                    get_message_type(&other)
                );
                Err(SessionError::FiniteStateMachine(fsm_err_for_state(
                    self.state,
                )))
            }
        }
    }

    /// Settle hold time & capabilities from the peer's OPEN and build the wire handle
    fn negotiate(&mut self, open: &Open) -> (WireConnection, mpsc::Receiver<Message>) {
        let hold_timer = std::cmp::min(open.hold_timer, HOLD_TIME);
        let received = Capabilities::from_parameters(open.parameters.clone());
        let capabilities = negotiate_capabilities(&received);
        let add_path = capabilities.EXTENDED_PATH_NLRI_SUPPORT;
        self.protocol.codec_mut().set_capabilities(capabilities);
        self.hold_timer = HoldTimer::new(hold_timer);
        WireConnection::new(self.addr, asn_from_open(open), hold_timer, add_path)
    }

    async fn process_message<H: EngineHandler>(
        &mut self,
        message: Message,
        wire: &WireConnection,
        handler: &H,
    ) -> Result<(), SessionError> {
        match message {
            Message::Open(_) => Err(SessionError::FiniteStateMachine(fsm_err_for_state(
                self.state,
            ))),
            Message::KeepAlive => {
                trace!("[{}] Hold time remaining: {}", self.addr, self.hold_timer);
                if self.state == ConnectionState::OpenConfirm {
                    self.update_state(ConnectionState::Established);
                    handler.established(wire).await;
                }
                handler.keepalive_received(wire).await;
                Ok(())
            }
            Message::Update(update) => match self.state {
                ConnectionState::Established => {
                    handler.update_received(wire, update).await;
                    Ok(())
                }
                state => Err(SessionError::FiniteStateMachine(fsm_err_for_state(state))),
            },
            Message::Notification(notification) => {
                warn!("[{}] NOTIFICATION: {}", self.addr, notification);
                handler.notification_received(wire, &notification).await;
                Err(SessionError::PeerNotification(
                    notification.major_err_code,
                    notification.minor_err_code,
                ))
            }
            Message::RouteRefresh(_) => {
                debug!("[{}] Ignoring ROUTEREFRESH", self.addr);
                Ok(())
            }
        }
    }

    // Send a message, and flush the send buffer afterwards
    async fn send_message(&mut self, message: Message) -> Result<(), SessionError> {
        trace!("[{}] Outgoing: {}", self.addr, get_message_type(&message));
        self.protocol.send(message).await?;
        self.counts.increment_sent();
        Ok(())
    }

    async fn notify(&mut self, major_err_code: u8, minor_err_code: u8) -> Result<(), SessionError> {
        let notification = Notification {
            major_err_code,
            minor_err_code,
            data: vec![],
        };
        self.send_message(Message::Notification(notification)).await
    }
}

/// Drive one accepted TCP connection until either side closes it
pub(super) async fn handle<H: EngineHandler>(
    stream: TcpStream,
    remote: SocketAddr,
    router_id: Ipv4Addr,
    handler: Arc<H>,
) {
    handler.new_neighbor(remote).await;
    let mut connection = Connection::new(remote, Framed::new(stream, MessageCodec::new()));

    if let Err(err) = connection.run(handler.as_ref(), router_id).await {
        if let Some((major, minor)) = err.notification_codes() {
            if let Err(notify_err) = connection.notify(major, minor).await {
                debug!("[{}] Couldn't send NOTIFICATION: {}", remote, notify_err);
            }
        }
        match err {
            SessionError::Deconfigured | SessionError::Rejected => info!("[{}] {}", remote, err),
            _ => warn!("[{}] {}", remote, err),
        }
    }
    info!(
        "[{}] Connection closed after {} ({})",
        remote,
        format_time_as_elapsed(connection.connect_time),
        connection.counts,
    );

    if let Some(wire) = connection.wire.take() {
        wire.disconnect();
        handler.disconnected(&wire).await;
    }
}
