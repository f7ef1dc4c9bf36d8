use bgp_rs::{ASPath, NLRIEncoding, PathAttribute, Segment, Update};
use ipnetwork::Ipv4Network;

use super::{prefix_from_network, RouteBatch};

/// Build an UPDATE from a validated batch of routes
///
/// Path attributes are only included when there are announcements, always in the
/// order ORIGIN, NEXT_HOP, AS_PATH, followed by COMMUNITY & LARGE_COMMUNITY if present.
/// With ADD-PATH negotiated every NLRI carries its path identifier.
pub fn encode(batch: &RouteBatch, add_path: bool) -> Update {
    let withdrawn_routes: Vec<NLRIEncoding> = batch
        .withdrawals
        .iter()
        .map(|(network, path_id)| to_nlri(network, *path_id, add_path))
        .collect();

    let mut attributes: Vec<PathAttribute> = Vec::with_capacity(5);
    let mut announced_routes: Vec<NLRIEncoding> = Vec::with_capacity(batch.announcements.len());
    if !batch.announcements.is_empty() {
        // Well-known, Mandatory Attributes
        attributes.push(PathAttribute::ORIGIN(batch.origin.clone()));
        if let Some(next_hop) = batch.next_hop {
            attributes.push(PathAttribute::NEXT_HOP(next_hop));
        }
        attributes.push(PathAttribute::AS_PATH(ASPath {
            segments: vec![Segment::AS_SEQUENCE(batch.as_path.clone())],
        }));

        // Optional Attributes
        if !batch.communities.is_empty() {
            attributes.push(PathAttribute::COMMUNITY(batch.communities.clone()));
        }
        if !batch.large_communities.is_empty() {
            attributes.push(PathAttribute::LARGE_COMMUNITY(
                batch.large_communities.clone(),
            ));
        }

        announced_routes.extend(
            batch
                .announcements
                .iter()
                .map(|(network, path_id)| to_nlri(network, *path_id, add_path)),
        );
    }

    Update {
        withdrawn_routes,
        attributes,
        announced_routes,
    }
}

fn to_nlri(network: &Ipv4Network, path_id: u32, add_path: bool) -> NLRIEncoding {
    let prefix = prefix_from_network(network);
    if add_path {
        NLRIEncoding::IP_WITH_PATH_ID((prefix, path_id))
    } else {
        NLRIEncoding::IP(prefix)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use super::*;
    use crate::models::{Nlri, RouteData};
    use crate::translate::prefix_to_string;

    fn batch(route: RouteData) -> RouteBatch {
        RouteBatch::try_from(&route).unwrap()
    }

    fn attribute_names(update: &Update) -> Vec<&'static str> {
        update
            .attributes
            .iter()
            .map(|attr| match attr {
                PathAttribute::ORIGIN(_) => "ORIGIN",
                PathAttribute::NEXT_HOP(_) => "NEXT_HOP",
                PathAttribute::AS_PATH(_) => "AS_PATH",
                PathAttribute::COMMUNITY(_) => "COMMUNITY",
                PathAttribute::LARGE_COMMUNITY(_) => "LARGE_COMMUNITY",
                _ => "OTHER",
            })
            .collect()
    }

    #[test]
    fn test_encode_announcement() {
        let update = encode(
            &batch(RouteData {
                announcements: vec![Nlri::new("1.1.1.1/32", 0)],
                next_hop: Some("8.8.8.8".to_string()),
                as_path: vec![179, 13335],
                ..RouteData::default()
            }),
            false,
        );
        assert_eq!(attribute_names(&update), vec!["ORIGIN", "NEXT_HOP", "AS_PATH"]);
        assert!(update.withdrawn_routes.is_empty());
        assert_eq!(update.announced_routes.len(), 1);
        match &update.announced_routes[0] {
            NLRIEncoding::IP(prefix) => assert_eq!(prefix_to_string(prefix), "1.1.1.1/32"),
            other => panic!("Unexpected NLRI {:?}", other),
        }
        match &update.attributes[2] {
            PathAttribute::AS_PATH(as_path) => match &as_path.segments[0] {
                Segment::AS_SEQUENCE(asns) => assert_eq!(asns, &vec![179, 13335]),
                _ => panic!("Expected AS_SEQUENCE"),
            },
            _ => panic!("Expected AS_PATH"),
        }
    }

    #[test]
    fn test_encode_optional_attributes() {
        let update = encode(
            &batch(RouteData {
                announcements: vec![Nlri::new("9.9.9.0/23", 12)],
                next_hop: Some("8.8.8.8".to_string()),
                communities: vec![(1, 2)],
                large_communities: vec![(179, 2, 3)],
                ..RouteData::default()
            }),
            true,
        );
        assert_eq!(
            attribute_names(&update),
            vec!["ORIGIN", "NEXT_HOP", "AS_PATH", "COMMUNITY", "LARGE_COMMUNITY"]
        );
        match &update.attributes[3] {
            PathAttribute::COMMUNITY(communities) => assert_eq!(communities, &vec![65538]),
            _ => panic!("Expected COMMUNITY"),
        }
        match &update.announced_routes[0] {
            NLRIEncoding::IP_WITH_PATH_ID((prefix, path_id)) => {
                assert_eq!(prefix_to_string(prefix), "9.9.9.0/23");
                assert_eq!(*path_id, 12);
            }
            other => panic!("Unexpected NLRI {:?}", other),
        }
    }

    #[test]
    fn test_encode_withdrawal_only() {
        let update = encode(
            &batch(RouteData {
                withdrawals: vec![Nlri::new("10.0.0.0/8", 0), Nlri::new("10.1.0.0/16", 0)],
                ..RouteData::default()
            }),
            false,
        );
        assert!(update.attributes.is_empty());
        assert!(update.announced_routes.is_empty());
        assert_eq!(update.withdrawn_routes.len(), 2);
    }
}
