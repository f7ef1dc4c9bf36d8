//! Route Translation
//!
//! Pure conversions between the client's [`RouteData`](crate::models::RouteData)
//! and `bgp_rs::Update` messages. Client input is first parsed into a
//! [`RouteBatch`] (rejecting anything malformed) so that encoding itself
//! can never fail.
mod decode;
mod encode;
mod parse;

pub use decode::decode;
pub use encode::encode;
pub use parse::{prefix_from_network, prefix_to_string};

use std::error::Error;
use std::fmt;
use std::net::{AddrParseError, IpAddr};

use bgp_rs::Origin;
use ipnetwork::Ipv4Network;

/// Pack a (high, low) community tuple into its 32-bit wire value
pub fn pack_community(community: (u16, u16)) -> u32 {
    (u32::from(community.0) * 65536) + u32::from(community.1)
}

/// Unpack a 32-bit community into its (high, low) halves
pub fn unpack_community(value: u32) -> (u16, u16) {
    ((value / 65536) as u16, (value % 65536) as u16)
}

/// A validated batch of route changes, ready to be encoded
#[derive(Clone, Debug)]
pub struct RouteBatch {
    pub withdrawals: Vec<(Ipv4Network, u32)>,
    pub announcements: Vec<(Ipv4Network, u32)>,
    pub next_hop: Option<IpAddr>,
    pub as_path: Vec<u32>,
    pub origin: Origin,
    /// Packed 32-bit values
    pub communities: Vec<u32>,
    pub large_communities: Vec<(u32, u32, u32)>,
}

impl RouteBatch {
    pub fn is_empty(&self) -> bool {
        self.withdrawals.is_empty() && self.announcements.is_empty()
    }
}

#[derive(Debug)]
pub enum ParseError {
    /// Prefix is not valid CIDR notation. [prefix]
    InvalidPrefix(String),
    /// Only IPv4 unicast prefixes can be relayed. [prefix]
    UnsupportedFamily(String),
    /// Next hop is missing or not an IPv4 address
    InvalidNextHop(String),
    /// Origin outside of IGP/EGP/INCOMPLETE. [origin]
    InvalidOrigin(u8),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ParseError::*;
        match self {
            InvalidPrefix(p) => write!(f, "Invalid prefix '{}'", p),
            UnsupportedFamily(p) => write!(f, "Unsupported address family for '{}'", p),
            InvalidNextHop(r) => write!(f, "Invalid next hop: {}", r),
            InvalidOrigin(o) => write!(f, "Invalid origin {} (expected 0, 1 or 2)", o),
        }
    }
}

impl Error for ParseError {}

impl From<AddrParseError> for ParseError {
    fn from(error: AddrParseError) -> Self {
        ParseError::InvalidNextHop(error.to_string())
    }
}
