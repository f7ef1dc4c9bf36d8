use std::convert::TryFrom;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bgp_rs::{Origin, Prefix, AFI};
use ipnetwork::{IpNetwork, Ipv4Network};
use itertools::Itertools;

use super::{pack_community, ParseError, RouteBatch};
use crate::models::{Nlri, RouteData};

impl TryFrom<&RouteData> for RouteBatch {
    type Error = ParseError;

    fn try_from(data: &RouteData) -> Result<Self, Self::Error> {
        let withdrawals = parse_nlri(&data.withdrawals)?;
        let announcements = parse_nlri(&data.announcements)?;
        let next_hop = match data.next_hop.as_deref().map(str::trim) {
            Some(next_hop) if !next_hop.is_empty() => {
                let addr: IpAddr = next_hop.parse()?;
                if !addr.is_ipv4() {
                    return Err(ParseError::InvalidNextHop(format!(
                        "'{}' is not an IPv4 address",
                        next_hop
                    )));
                }
                Some(addr)
            }
            _ => None,
        };
        if !announcements.is_empty() && next_hop.is_none() {
            return Err(ParseError::InvalidNextHop(
                "announcements require a next hop".to_string(),
            ));
        }
        Ok(RouteBatch {
            withdrawals,
            announcements,
            next_hop,
            as_path: data.as_path.clone(),
            origin: origin_from_u8(data.origin)?,
            communities: data
                .communities
                .iter()
                .map(|c| pack_community(*c))
                .unique()
                .collect(),
            large_communities: data.large_communities.iter().copied().unique().collect(),
        })
    }
}

fn parse_nlri(entries: &[Nlri]) -> Result<Vec<(Ipv4Network, u32)>, ParseError> {
    entries
        .iter()
        .map(|nlri| Ok((network_from_str(&nlri.prefix)?, nlri.id)))
        .collect()
}

/// Parse a CIDR prefix (E.g. "192.168.0.0/24"), only IPv4 is relayed
fn network_from_str(prefix: &str) -> Result<Ipv4Network, ParseError> {
    let prefix = prefix.trim();
    if !prefix.contains('/') {
        return Err(ParseError::InvalidPrefix(prefix.to_string()));
    }
    match prefix
        .parse::<IpNetwork>()
        .map_err(|_| ParseError::InvalidPrefix(prefix.to_string()))?
    {
        IpNetwork::V4(network) => Ok(network),
        IpNetwork::V6(_) => Err(ParseError::UnsupportedFamily(prefix.to_string())),
    }
}

pub(super) fn origin_from_u8(origin: u8) -> Result<Origin, ParseError> {
    match origin {
        0 => Ok(Origin::IGP),
        1 => Ok(Origin::EGP),
        2 => Ok(Origin::INCOMPLETE),
        other => Err(ParseError::InvalidOrigin(other)),
    }
}

pub(super) fn origin_to_u8(origin: &Origin) -> u8 {
    match origin {
        Origin::IGP => 0,
        Origin::EGP => 1,
        Origin::INCOMPLETE => 2,
    }
}

/// Convert an IPv4 network to a bgp_rs::Prefix
pub fn prefix_from_network(network: &Ipv4Network) -> Prefix {
    Prefix {
        protocol: AFI::IPV4,
        length: network.prefix(),
        prefix: network.ip().octets().to_vec(),
    }
}

/// Format a bgp_rs::Prefix as CIDR, E.g. "10.0.0.0/8"
/// Prefix octets may be truncated to the prefix length on the wire
pub fn prefix_to_string(prefix: &Prefix) -> String {
    let addr = match prefix.protocol {
        AFI::IPV6 => {
            let mut octets = [0u8; 16];
            let len = prefix.prefix.len().min(16);
            octets[..len].clone_from_slice(&prefix.prefix[..len]);
            IpAddr::from(Ipv6Addr::from(octets))
        }
        _ => {
            let mut octets = [0u8; 4];
            let len = prefix.prefix.len().min(4);
            octets[..len].clone_from_slice(&prefix.prefix[..len]);
            IpAddr::from(Ipv4Addr::from(octets))
        }
    };
    format!("{}/{}", addr, prefix.length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_data() -> RouteData {
        RouteData {
            withdrawals: vec![Nlri::new("10.0.0.0/8", 0)],
            announcements: vec![Nlri::new("1.1.1.1/32", 4), Nlri::new("9.9.9.0/23", 0)],
            next_hop: Some("8.8.8.8".to_string()),
            as_path: vec![179, 13335],
            origin: 2,
            communities: vec![(1, 2), (179, 2473), (1, 2)],
            large_communities: vec![(179, 1, 1)],
        }
    }

    #[test]
    fn test_parse_route_data() {
        let batch = RouteBatch::try_from(&route_data()).unwrap();
        assert_eq!(batch.withdrawals.len(), 1);
        assert_eq!(batch.announcements[0].1, 4);
        assert_eq!(batch.announcements[1].0.prefix(), 23);
        assert_eq!(batch.next_hop, Some("8.8.8.8".parse().unwrap()));
        assert_eq!(origin_to_u8(&batch.origin), 2);
        // Communities are a set
        assert_eq!(batch.communities, vec![65538, 11_733_417]);
        assert_eq!(batch.large_communities, vec![(179, 1, 1)]);
    }

    #[test]
    fn test_parse_invalid_prefix() {
        let mut data = route_data();
        data.announcements.push(Nlri::new("1.1.1.300/32", 0));
        match RouteBatch::try_from(&data) {
            Err(ParseError::InvalidPrefix(p)) => assert_eq!(p, "1.1.1.300/32"),
            other => panic!("Expected InvalidPrefix, got {:?}", other),
        }

        let mut data = route_data();
        data.withdrawals = vec![Nlri::new("10.0.0.0", 0)];
        assert!(RouteBatch::try_from(&data).is_err());

        let mut data = route_data();
        data.announcements = vec![Nlri::new("2001:db8::/32", 0)];
        match RouteBatch::try_from(&data) {
            Err(ParseError::UnsupportedFamily(_)) => (),
            other => panic!("Expected UnsupportedFamily, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_next_hop() {
        let mut data = route_data();
        data.next_hop = None;
        assert!(RouteBatch::try_from(&data).is_err());

        // Withdraw-only batches don't need a next hop
        data.announcements.clear();
        let batch = RouteBatch::try_from(&data).unwrap();
        assert!(batch.next_hop.is_none());

        let mut data = route_data();
        data.next_hop = Some("2001:db8::1".to_string());
        assert!(RouteBatch::try_from(&data).is_err());
        data.next_hop = Some("8.8.8".to_string());
        assert!(RouteBatch::try_from(&data).is_err());
    }

    #[test]
    fn test_parse_origin() {
        let mut data = route_data();
        data.origin = 3;
        match RouteBatch::try_from(&data) {
            Err(ParseError::InvalidOrigin(3)) => (),
            other => panic!("Expected InvalidOrigin, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_to_string() {
        let prefix = Prefix {
            protocol: AFI::IPV4,
            length: 23,
            prefix: vec![9, 9, 9],
        };
        assert_eq!(prefix_to_string(&prefix), "9.9.9.0/23");
        let network: Ipv4Network = "1.1.1.1/32".parse().unwrap();
        assert_eq!(prefix_to_string(&prefix_from_network(&network)), "1.1.1.1/32");
        let prefix = Prefix {
            protocol: AFI::IPV6,
            length: 32,
            prefix: vec![0x20, 0x01, 0x0d, 0xb8],
        };
        assert_eq!(prefix_to_string(&prefix), "2001:db8::/32");
    }
}
