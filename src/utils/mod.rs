mod display;
pub use display::*;

use std::net::{IpAddr, Ipv4Addr};

/// Express a router-id as the u32 identifier carried in OPEN
pub fn router_id_to_u32(router_id: Ipv4Addr) -> u32 {
    u32::from_be_bytes(router_id.octets())
}

/// Collapse IPv4-mapped IPv6 addresses (::ffff:a.b.c.d) to plain IPv4
/// so a dual-stack listener reports the same peer IP as the client sends
pub fn unmap_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_id_to_u32() {
        assert_eq!(router_id_to_u32(Ipv4Addr::new(1, 1, 1, 1)), 16843009);
        assert_eq!(router_id_to_u32(Ipv4Addr::new(0, 0, 253, 232)), 65000);
    }

    #[test]
    fn test_unmap_ip() {
        let mapped: IpAddr = "::ffff:192.0.2.1".parse().unwrap();
        assert_eq!(unmap_ip(mapped), "192.0.2.1".parse::<IpAddr>().unwrap());
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(unmap_ip(v6), v6);
    }
}
