use std::net::Ipv4Addr;

use bgp_rs::{
    AddPathDirection, Capabilities, Open, OpenCapability, OpenParameter, AFI, SAFI,
};

use crate::utils::router_id_to_u32;

// AS-TRANS: RFC 6793 [4.2.3.9]
const AS_TRANS: u16 = 23456;

/// Capabilities advertised to every peer: IPv4 unicast with ADD-PATH & 4-byte ASN
pub fn local_capabilities(local_asn: u32) -> Vec<OpenCapability> {
    vec![
        OpenCapability::MultiProtocol((AFI::IPV4, SAFI::Unicast)),
        OpenCapability::AddPath(vec![(
            AFI::IPV4,
            SAFI::Unicast,
            AddPathDirection::SendReceivePaths,
        )]),
        OpenCapability::FourByteASN(local_asn),
    ]
}

pub fn create_open(local_asn: u32, router_id: Ipv4Addr, hold_timer: u16) -> Open {
    let two_byte_asn = if local_asn < 65535 {
        local_asn as u16
    } else {
        AS_TRANS
    };
    Open {
        version: 4,
        peer_asn: two_byte_asn,
        hold_timer,
        identifier: router_id_to_u32(router_id),
        parameters: vec![OpenParameter::Capabilities(local_capabilities(local_asn))],
    }
}

/// Check 4-byte ASN first, fallback to 2-byte
pub fn asn_from_open(open: &Open) -> u32 {
    open.parameters
        .iter()
        .filter_map(|p| match p {
            OpenParameter::Capabilities(caps) => Some(caps),
            _ => None,
        })
        .flatten()
        .find_map(|c| match c {
            OpenCapability::FourByteASN(asn) => Some(*asn),
            _ => None,
        })
        .unwrap_or_else(|| u32::from(open.peer_asn))
}

/// Work out the common set of capabilities between what we advertise and what the peer advertised
///
/// Only what affects message parsing is negotiated, the rest is left at its default.
pub fn common_capabilities(a: &Capabilities, b: &Capabilities) -> Capabilities {
    let mut negotiated = Capabilities::default();

    negotiated.MP_BGP_SUPPORT = a
        .MP_BGP_SUPPORT
        .intersection(&b.MP_BGP_SUPPORT)
        .copied()
        .collect();
    negotiated.FOUR_OCTET_ASN_SUPPORT = a.FOUR_OCTET_ASN_SUPPORT & b.FOUR_OCTET_ASN_SUPPORT;

    // Path ids are either on for both directions or off, so only
    // families where both sides send and receive them qualify
    negotiated.ADD_PATH_SUPPORT = a
        .ADD_PATH_SUPPORT
        .iter()
        .filter(|&(family, direction)| {
            is_send_receive(direction)
                && b.ADD_PATH_SUPPORT
                    .get(family)
                    .map(is_send_receive)
                    .unwrap_or(false)
        })
        .map(|(family, direction)| (*family, *direction))
        .collect();
    negotiated.EXTENDED_PATH_NLRI_SUPPORT = !negotiated.ADD_PATH_SUPPORT.is_empty();

    negotiated
}

fn is_send_receive(direction: &AddPathDirection) -> bool {
    matches!(direction, AddPathDirection::SendReceivePaths)
}

/// Capabilities from the local OPEN, for negotiation
pub fn capabilities_for(local_asn: u32) -> Capabilities {
    Capabilities::from_parameters(vec![OpenParameter::Capabilities(local_capabilities(
        local_asn,
    ))])
}

/// Negotiate against a peer's OPEN before our local ASN is known
/// (the ASN value itself doesn't change how messages are parsed)
pub fn negotiate_capabilities(received: &Capabilities) -> Capabilities {
    common_capabilities(&capabilities_for(u32::from(AS_TRANS)), received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_open() {
        let open = create_open(64512, Ipv4Addr::new(1, 1, 1, 1), 180);
        assert_eq!(open.peer_asn, 64512);
        assert_eq!(open.identifier, 16843009);
        assert_eq!(open.hold_timer, 180);
        assert_eq!(asn_from_open(&open), 64512);

        let open = create_open(4_200_000_000, Ipv4Addr::new(1, 1, 1, 1), 180);
        assert_eq!(open.peer_asn, 23456);
        assert_eq!(asn_from_open(&open), 4_200_000_000);
    }

    #[test]
    fn test_asn_from_two_byte_open() {
        let open = Open {
            version: 4,
            peer_asn: 923,
            hold_timer: 90,
            identifier: 1,
            parameters: vec![],
        };
        assert_eq!(asn_from_open(&open), 923);
    }

    #[test]
    fn test_common_capabilities() {
        let local = capabilities_for(64512);
        let with_add_path = capabilities_for(923);
        let negotiated = common_capabilities(&local, &with_add_path);
        assert!(negotiated.EXTENDED_PATH_NLRI_SUPPORT);
        assert!(negotiated.FOUR_OCTET_ASN_SUPPORT);

        let plain = Capabilities::from_parameters(vec![OpenParameter::Capabilities(vec![
            OpenCapability::MultiProtocol((AFI::IPV4, SAFI::Unicast)),
        ])]);
        let negotiated = common_capabilities(&local, &plain);
        assert!(!negotiated.EXTENDED_PATH_NLRI_SUPPORT);
        assert!(!negotiate_capabilities(&plain).EXTENDED_PATH_NLRI_SUPPORT);
        assert!(negotiate_capabilities(&with_add_path).EXTENDED_PATH_NLRI_SUPPORT);
        assert!(!negotiated.FOUR_OCTET_ASN_SUPPORT);
        assert!(negotiated.ADD_PATH_SUPPORT.is_empty());
    }

    #[test]
    fn test_one_direction_add_path() {
        let local = capabilities_for(64512);
        for direction in vec![
            AddPathDirection::ReceivePaths,
            AddPathDirection::SendPaths,
        ] {
            let peer = Capabilities::from_parameters(vec![OpenParameter::Capabilities(vec![
                OpenCapability::MultiProtocol((AFI::IPV4, SAFI::Unicast)),
                OpenCapability::AddPath(vec![(AFI::IPV4, SAFI::Unicast, direction)]),
            ])]);
            let negotiated = common_capabilities(&local, &peer);
            assert!(!negotiated.EXTENDED_PATH_NLRI_SUPPORT);
            assert!(negotiated.ADD_PATH_SUPPORT.is_empty());
            assert!(!negotiate_capabilities(&peer).EXTENDED_PATH_NLRI_SUPPORT);
        }
    }
}
