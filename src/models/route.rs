use serde::{Deserialize, Serialize};

/// A single prefix (CIDR string) with its ADD-PATH path identifier
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Nlri {
    pub prefix: String,
    #[serde(default)]
    pub id: u32,
}

impl Nlri {
    pub fn new(prefix: &str, id: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            id,
        }
    }
}

/// Transport-neutral batch of route changes, used for both directions:
///   browser -> wire (routes to announce/withdraw)
///   wire -> browser (routes learned from the peer)
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    #[serde(default)]
    pub withdrawals: Vec<Nlri>,
    #[serde(default, alias = "prefixes")]
    pub announcements: Vec<Nlri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<String>,
    #[serde(default)]
    pub as_path: Vec<u32>,
    // IGP=0, EGP=1, INCOMPLETE=2
    #[serde(default)]
    pub origin: u8,
    #[serde(default)]
    pub communities: Vec<(u16, u16)>,
    #[serde(default)]
    pub large_communities: Vec<(u32, u32, u32)>,
}

impl RouteData {
    /// No withdrawals and no announcements, nothing to send on the wire
    pub fn is_empty(&self) -> bool {
        self.withdrawals.is_empty() && self.announcements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_data_deserialize_defaults() {
        let route: RouteData = serde_json::from_str(
            r#"{"announcements": [{"prefix": "1.1.1.1/32"}], "nextHop": "8.8.8.8", "asPath": [179, 13335]}"#,
        )
        .unwrap();
        assert_eq!(route.announcements, vec![Nlri::new("1.1.1.1/32", 0)]);
        assert!(route.withdrawals.is_empty());
        assert_eq!(route.next_hop.as_deref(), Some("8.8.8.8"));
        assert_eq!(route.as_path, vec![179, 13335]);
        assert_eq!(route.origin, 0);
        assert!(route.communities.is_empty());
        assert!(!route.is_empty());
    }

    #[test]
    fn test_route_data_serialize() {
        let route = RouteData {
            announcements: vec![Nlri::new("9.9.9.0/23", 7)],
            next_hop: Some("8.8.8.8".to_string()),
            communities: vec![(1, 2)],
            large_communities: vec![(179, 1, 2)],
            ..RouteData::default()
        };
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(value["announcements"][0]["id"], 7);
        assert_eq!(value["nextHop"], "8.8.8.8");
        assert_eq!(value["communities"][0][1], 2);
        assert_eq!(value["largeCommunities"][0][0], 179);
    }

    #[test]
    fn test_route_data_prefixes_alias() {
        let route: RouteData = serde_json::from_str(
            r#"{"prefixes": [{"prefix": "203.0.113.0/24", "id": 2}], "nextHop": "8.8.8.8"}"#,
        )
        .unwrap();
        assert_eq!(route.announcements, vec![Nlri::new("203.0.113.0/24", 2)]);
        // Always serialized under the canonical name
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(value["announcements"][0]["prefix"], "203.0.113.0/24");
        assert!(value.get("prefixes").is_none());
    }
}
