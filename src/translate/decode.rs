use bgp_rs::{Identifier, NLRIEncoding, PathAttribute, Segment, Update};

use super::parse::origin_to_u8;
use super::{prefix_to_string, unpack_community};
use crate::models::{Nlri, RouteData};

/// Convert a received UPDATE into client-facing RouteData
///
/// Only IP prefix NLRI are kept, anything else (VPN, flowspec, ...) is skipped.
/// Missing attributes are left at their zero value.
pub fn decode(update: &Update) -> RouteData {
    let mut data = RouteData {
        withdrawals: to_nlri(&update.withdrawn_routes),
        announcements: to_nlri(&update.announced_routes),
        ..RouteData::default()
    };

    if let Some(PathAttribute::ORIGIN(origin)) = update.get(Identifier::ORIGIN) {
        data.origin = origin_to_u8(origin);
    }
    if let Some(PathAttribute::NEXT_HOP(next_hop)) = update.get(Identifier::NEXT_HOP) {
        data.next_hop = Some(next_hop.to_string());
    }
    if let Some(PathAttribute::AS_PATH(as_path)) = update.get(Identifier::AS_PATH) {
        data.as_path = as_path
            .segments
            .iter()
            .flat_map(|segment| match segment {
                Segment::AS_SEQUENCE(asns) => asns.iter().copied(),
                Segment::AS_SET(asns) => asns.iter().copied(),
            })
            .collect();
    }
    if let Some(PathAttribute::COMMUNITY(communities)) = update.get(Identifier::COMMUNITY) {
        data.communities = communities.iter().map(|c| unpack_community(*c)).collect();
    }
    if let Some(PathAttribute::LARGE_COMMUNITY(communities)) =
        update.get(Identifier::LARGE_COMMUNITY)
    {
        data.large_communities = communities.clone();
    }
    data
}

fn to_nlri(routes: &[NLRIEncoding]) -> Vec<Nlri> {
    routes
        .iter()
        .filter_map(|nlri| match nlri {
            NLRIEncoding::IP(prefix) => Some(Nlri {
                prefix: prefix_to_string(prefix),
                id: 0,
            }),
            NLRIEncoding::IP_WITH_PATH_ID((prefix, path_id)) => Some(Nlri {
                prefix: prefix_to_string(prefix),
                id: *path_id,
            }),
            _ => None,
        })
        .collect()
}
