use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use super::client::{ClientError, ClientState, Handled};
use crate::bridge::{Bridge, PeerSession};
use crate::models::{InitData, Packet};

type ClientSink = Arc<Mutex<SplitSink<WebSocketStream<TcpStream>, WsMessage>>>;

/// Upgrade path for browser clients
const WS_PATHS: [&str; 2] = ["/ws", "/ws/"];

/// WebSocket listener for browser clients
pub struct WebSocketServer {
    listener: TcpListener,
    init: InitData,
}

impl WebSocketServer {
    pub async fn bind(addr: SocketAddr, init: InitData) -> Result<Self, io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening for WebSocket clients on {}", listener.local_addr()?);
        Ok(Self { listener, init })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.listener.local_addr()
    }

    /// Accept clients forever, each one handled in its own task
    pub async fn serve(self, bridge: Bridge) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    tokio::spawn(handle_client(
                        stream,
                        remote,
                        bridge.clone(),
                        self.init.clone(),
                    ));
                }
                Err(err) => warn!("Error accepting client: {}", err),
            }
        }
    }
}

fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if WS_PATHS.contains(&request.uri().path()) {
        return Ok(response);
    }
    let mut not_found = ErrorResponse::new(Some("Not Found".to_string()));
    *not_found.status_mut() = StatusCode::NOT_FOUND;
    Err(not_found)
}

async fn send_packet(sink: &ClientSink, packet: &Packet) -> Result<(), ClientError> {
    let text = serde_json::to_string(packet).map_err(|err| ClientError::Transport(err.to_string()))?;
    sink.lock()
        .await
        .send(WsMessage::Text(text))
        .await
        .map_err(|err| ClientError::Transport(err.to_string()))
}

async fn handle_client(stream: TcpStream, remote: SocketAddr, bridge: Bridge, init: InitData) {
    let socket = match accept_hdr_async(stream, check_path).await {
        Ok(socket) => socket,
        Err(err) => {
            debug!("[{}] WebSocket handshake failed: {}", remote, err);
            return;
        }
    };
    info!("[{}] Client connected", remote);
    let (sink, mut source) = socket.split();
    let sink: ClientSink = Arc::new(Mutex::new(sink));
    let mut client = ClientState::new(bridge);

    if let Err(err) = send_packet(&sink, &Packet::InitData(init)).await {
        warn!("[{}] {}", remote, err);
        return;
    }

    while let Some(message) = source.next().await {
        let text = match message {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(WsMessage::Binary(_)) => {
                let error = Packet::error("Expected a text message");
                if send_packet(&sink, &error).await.is_err() {
                    break;
                }
                continue;
            }
            // Ping/pong are answered by the transport
            Ok(_) => continue,
            Err(err) => {
                debug!("[{}] Read error: {}", remote, err);
                break;
            }
        };
        trace!("[{}] Incoming: {}", remote, text);
        match client.handle_message(&text).await {
            Ok(Handled::SessionCreated(session, packets)) => {
                info!("[{}] Session created for {}", remote, session.key());
                tokio::spawn(drive(session, packets, Arc::clone(&sink)));
            }
            Ok(Handled::RoutesQueued) => (),
            Err(err) => {
                warn!("[{}] {}", remote, err);
                if send_packet(&sink, &Packet::error(&err)).await.is_err() {
                    break;
                }
            }
        }
    }
    client.close();
    info!("[{}] Client disconnected", remote);
}

/// Forward a session's packets to its client until the session ends
///
/// Whatever is still queued when the session finishes is flushed before exiting.
async fn drive(session: Arc<PeerSession>, mut packets: broadcast::Receiver<Packet>, sink: ClientSink) {
    let key = session.key();
    loop {
        tokio::select! {
            biased;
            packet = packets.recv() => match packet {
                Ok(packet) => {
                    trace!("[{}] Outgoing: {}", key, packet.kind());
                    if let Err(err) = send_packet(&sink, &packet).await {
                        debug!("[{}] {}", key, err);
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[{}] Client is behind, dropped {} messages", key, skipped);
                }
                Err(RecvError::Closed) => return,
            },
            _ = session.finished() => break,
        }
    }
    loop {
        match packets.try_recv() {
            Ok(packet) => {
                if send_packet(&sink, &packet).await.is_err() {
                    return;
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!("[{}] Client is behind, dropped {} messages", key, skipped);
            }
            Err(_) => break,
        }
    }
    debug!("[{}] Client driver finished", key);
}
