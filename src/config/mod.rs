mod file;

use std::error;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::models::InitData;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    /// Config parsed but can't be used. [reason]
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError::*;
        match self {
            Io(err) => write!(f, "Config Error: {}", err),
            Toml(err) => write!(f, "Config Error: {}", err),
            Invalid(reason) => write!(f, "Config Error: {}", reason),
        }
    }
}

impl error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(error: io::Error) -> Self {
        ConfigError::Io(error)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::Toml(error)
    }
}

/// Resolved server config, every default filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bgp_addr: SocketAddr,
    pub public_addr: IpAddr,
    pub router_id: Ipv4Addr,
    pub http_addr: SocketAddr,
    pub log_timestamp: bool,
}

impl ServerConfig {
    /// Parse a TOML config file, `public_addr` (if given) overrides the file's value
    pub fn from_file(path: &str, public_addr: Option<IpAddr>) -> Result<Self, ConfigError> {
        let mut spec = file::ServerConfigSpec::from_file(path)?;
        if public_addr.is_some() {
            spec.public_addr = public_addr;
        }
        Self::from_spec(spec)
    }

    /// Config without a file, all defaults
    pub fn from_defaults(public_addr: Option<IpAddr>) -> Result<Self, ConfigError> {
        let spec = file::ServerConfigSpec {
            public_addr,
            ..Default::default()
        };
        Self::from_spec(spec)
    }

    fn from_spec(spec: file::ServerConfigSpec) -> Result<Self, ConfigError> {
        let public_addr = match spec.public_addr {
            Some(addr) => addr,
            None if spec.bgp_addr.is_unspecified() => {
                return Err(ConfigError::Invalid(format!(
                    "public_addr is required when listening on {}",
                    spec.bgp_addr
                )));
            }
            None => spec.bgp_addr,
        };
        let router_id = match (spec.router_id, public_addr) {
            (Some(router_id), _) => router_id,
            (None, IpAddr::V4(addr)) => addr,
            (None, IpAddr::V6(_)) => {
                return Err(ConfigError::Invalid(
                    "router_id is required when public_addr is IPv6".to_string(),
                ));
            }
        };
        Ok(Self {
            bgp_addr: SocketAddr::new(spec.bgp_addr, spec.bgp_port),
            public_addr,
            router_id,
            http_addr: SocketAddr::new(spec.http_addr, spec.http_port),
            log_timestamp: spec.log_timestamp,
        })
    }

    /// Sent to each client on connect
    pub fn init_data(&self) -> InitData {
        InitData {
            router_id: IpAddr::from(self.router_id),
            listen_ip: self.public_addr,
        }
    }
}
