use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

use super::ConfigError;

struct Defaults {}

impl Defaults {
    fn bgp_addr() -> IpAddr {
        IpAddr::from(Ipv4Addr::UNSPECIFIED)
    }

    fn bgp_port() -> u16 {
        179
    }

    fn http_addr() -> IpAddr {
        IpAddr::from(Ipv4Addr::UNSPECIFIED)
    }

    fn http_port() -> u16 {
        8080
    }

    fn log_timestamp() -> bool {
        true
    }
}

/// Config (toml) representation of the server config
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ServerConfigSpec {
    // Where BGP peers connect to
    #[serde(default = "Defaults::bgp_addr")]
    pub(super) bgp_addr: IpAddr,
    #[serde(default = "Defaults::bgp_port")]
    pub(super) bgp_port: u16,

    // Address clients are told to point their routers at
    // Required if bgp_addr is unspecified (0.0.0.0 or ::)
    pub(super) public_addr: Option<IpAddr>,
    // Will defer to public_addr if not provided
    pub(super) router_id: Option<Ipv4Addr>,

    // Where browsers connect to
    #[serde(default = "Defaults::http_addr")]
    pub(super) http_addr: IpAddr,
    #[serde(default = "Defaults::http_port")]
    pub(super) http_port: u16,

    // Disable when an external log system adds its own
    #[serde(default = "Defaults::log_timestamp")]
    pub(super) log_timestamp: bool,
}

impl Default for ServerConfigSpec {
    fn default() -> Self {
        Self {
            bgp_addr: Defaults::bgp_addr(),
            bgp_port: Defaults::bgp_port(),
            public_addr: None,
            router_id: None,
            http_addr: Defaults::http_addr(),
            http_port: Defaults::http_port(),
            log_timestamp: Defaults::log_timestamp(),
        }
    }
}

impl ServerConfigSpec {
    pub(super) fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub(super) fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_toml(&contents)
    }
}
