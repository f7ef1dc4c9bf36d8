use std::net::IpAddr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{CreateRequest, FsmState, RouteData};

/// Inbound envelope: `{"type": ..., "data": ...}` sent by the browser
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    CreateRequest(CreateRequest),
    RouteData(RouteData),
}

/// Outbound envelope: everything a session (or the transport) reports to the browser
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Packet {
    InitData(InitData),
    #[serde(rename = "FSMUpdate")]
    FsmUpdate(FsmUpdate),
    Event(Event),
    RouteData(RouteData),
    Error(ErrorMessage),
}

impl Packet {
    pub fn fsm(state: FsmState) -> Self {
        Packet::FsmUpdate(FsmUpdate::new(state))
    }

    pub fn event(message: &str) -> Self {
        Packet::Event(Event::new(message))
    }

    pub fn error<T: ToString>(message: T) -> Self {
        Packet::Error(ErrorMessage {
            message: message.to_string(),
        })
    }

    /// Name of the envelope type (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::InitData(_) => "InitData",
            Packet::FsmUpdate(_) => "FSMUpdate",
            Packet::Event(_) => "Event",
            Packet::RouteData(_) => "RouteData",
            Packet::Error(_) => "Error",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FsmUpdate {
    pub state: FsmState,
    pub hold_timer: u16,
    pub keepalive_timer: u16,
}

impl FsmUpdate {
    pub fn new(state: FsmState) -> Self {
        Self {
            state,
            hold_timer: 0,
            keepalive_timer: 0,
        }
    }

    /// Established session, keepalive timer is 1/3 of the hold timer
    pub fn established(hold_timer: u16) -> Self {
        Self {
            state: FsmState::Established,
            hold_timer,
            keepalive_timer: hold_timer / 3,
        }
    }
}

/// Transcript entry for keepalive/update activity; nanoseconds since epoch
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Event {
    pub timestamp: i64,
    pub message: String,
}

impl Event {
    pub fn new(message: &str) -> Self {
        Self {
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            message: message.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorMessage {
    pub message: String,
}

/// Sent once on client connect, tells the browser where to point its router
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub router_id: IpAddr,
    pub listen_ip: IpAddr,
}
