use std::convert::TryFrom;
use std::error;
use std::fmt;
use std::sync::Arc;

use log::debug;
use tokio::sync::broadcast;

use crate::bridge::{Bridge, BridgeError, PeerSession};
use crate::models::{ClientMessage, Packet};
use crate::translate::{ParseError, RouteBatch};

#[derive(Debug)]
pub enum ClientError {
    /// Message isn't a known envelope. [reason]
    Malformed(String),
    /// This connection already has a session
    SessionExists,
    /// RouteData sent before CreateRequest
    NoSession,
    Translation(ParseError),
    Bridge(BridgeError),
    /// Couldn't write to the client. [reason]
    Transport(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ClientError::*;
        match self {
            Malformed(reason) => write!(f, "Invalid message: {}", reason),
            SessionExists => write!(f, "A session already exists for this connection"),
            NoSession => write!(f, "No session, send a CreateRequest first"),
            Translation(err) => write!(f, "{}", err),
            Bridge(err) => write!(f, "{}", err),
            Transport(reason) => write!(f, "Transport error [{}]", reason),
        }
    }
}

impl error::Error for ClientError {}

impl From<ParseError> for ClientError {
    fn from(error: ParseError) -> Self {
        ClientError::Translation(error)
    }
}

impl From<BridgeError> for ClientError {
    fn from(error: BridgeError) -> Self {
        ClientError::Bridge(error)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::Malformed(error.to_string())
    }
}

/// Outcome of one client message that went through
pub enum Handled {
    /// A session was started, its packets need forwarding to the client
    SessionCreated(Arc<PeerSession>, broadcast::Receiver<Packet>),
    RoutesQueued,
}

/// Protocol state for one client connection: at most one session, ever
pub struct ClientState {
    bridge: Bridge,
    session: Option<Arc<PeerSession>>,
}

impl ClientState {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Arc<PeerSession>> {
        self.session.as_ref()
    }

    /// Handle one text message from the client
    /// Errors are meant for the client, the connection stays usable
    pub async fn handle_message(&mut self, text: &str) -> Result<Handled, ClientError> {
        match serde_json::from_str::<ClientMessage>(text)? {
            ClientMessage::CreateRequest(request) => {
                if self.session.is_some() {
                    return Err(ClientError::SessionExists);
                }
                let (session, packets) = self.bridge.create_session(&request).await?;
                self.session = Some(Arc::clone(&session));
                Ok(Handled::SessionCreated(session, packets))
            }
            ClientMessage::RouteData(routes) => {
                let session = self.session.as_ref().ok_or(ClientError::NoSession)?;
                if session.is_cancelled() {
                    return Err(BridgeError::SessionEnded.into());
                }
                let batch = RouteBatch::try_from(&routes)?;
                session.queue_routes(batch)?;
                Ok(Handled::RoutesQueued)
            }
        }
    }

    /// Client went away, end its session (if still running)
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("[{}] Client closed, cancelling session", session.key());
            session.cancel();
        }
    }
}

impl Drop for ClientState {
    fn drop(&mut self) {
        self.close();
    }
}
