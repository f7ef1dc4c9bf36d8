use std::fmt;
use std::io::{Error, ErrorKind};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::utils::unmap_ip;

/// Client-visible projection of a peering session's FSM.
///
/// The authoritative FSM lives in the protocol engine, these are only
/// reported as the engine drives them (plus `Idle` on teardown).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum FsmState {
    Idle,
    Active,
    OpenSent,
    Established,
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            FsmState::Idle => "Idle",
            FsmState::Active => "Active",
            FsmState::OpenSent => "OpenSent",
            FsmState::Established => "Established",
        };
        write!(f, "{}", word)
    }
}

/// Unique identity of one exposed peering slot (peer IP + peer ASN)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub ip: IpAddr,
    pub asn: u32,
}

impl PeerKey {
    pub fn new(ip: IpAddr, asn: u32) -> Self {
        Self {
            ip: unmap_ip(ip),
            asn,
        }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}|{}", self.ip, self.asn)
    }
}

/// Client request to open an exposed peering slot
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CreateRequest {
    #[serde(rename = "peerASN")]
    pub peer_asn: u32,
    #[serde(rename = "peerIP")]
    pub peer_ip: String,
    #[serde(rename = "localASN")]
    pub local_asn: u32,
}

impl CreateRequest {
    /// Parse the request's peer address into the session's [`PeerKey`]
    pub fn to_key(&self) -> Result<PeerKey, Error> {
        let ip: IpAddr = self.peer_ip.trim().parse().map_err(|_| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid peer IP '{}'", self.peer_ip),
            )
        })?;
        Ok(PeerKey::new(ip, self.peer_asn))
    }
}
