//! Client transport
//!
//! Browsers connect over WebSocket, ask for a session with one peer and
//! exchange JSON envelopes with it for as long as the socket is open.
mod client;
mod handler;

pub use client::{ClientError, ClientState, Handled};
pub use handler::WebSocketServer;
