//! Endpoint addresses for object connections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use url::{Host, Url};

use crate::error::IpcError;

const SCHEME: &str = "tcp";

/// Address of a listening endpoint, rendered as `tcp://host:port`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(SocketAddr);

impl Address {
    pub fn new(socket_addr: SocketAddr) -> Self {
        Self(socket_addr)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl From<SocketAddr> for Address {
    fn from(socket_addr: SocketAddr) -> Self {
        Self(socket_addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", SCHEME, self.0)
    }
}

impl FromStr for Address {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| IpcError::InvalidAddress(format!("{}: {}", s, e)))?;
        if url.scheme() != SCHEME {
            return Err(IpcError::InvalidAddress(format!(
                "{}: unsupported scheme '{}'",
                s,
                url.scheme()
            )));
        }

        let port = url
            .port()
            .ok_or_else(|| IpcError::InvalidAddress(format!("{}: missing port", s)))?;

        let ip = match url.host() {
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
            // Hosts of non-special schemes are opaque, so IPv4 arrives as a domain.
            Some(Host::Domain(domain)) => match domain.parse::<IpAddr>() {
                Ok(ip) => ip,
                Err(_) if domain.eq_ignore_ascii_case("localhost") => {
                    IpAddr::V4(Ipv4Addr::LOCALHOST)
                }
                Err(_) => {
                    return Err(IpcError::InvalidAddress(format!(
                        "{}: host names other than localhost are not supported ({})",
                        s, domain
                    )))
                }
            },
            None => return Err(IpcError::InvalidAddress(format!("{}: missing host", s))),
        };

        Ok(Self(SocketAddr::new(ip, port)))
    }
}

impl TryFrom<String> for Address {
    type Error = IpcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let address = Address::new("127.0.0.1:40123".parse().unwrap());
        assert_eq!(address.to_string(), "tcp://127.0.0.1:40123");
        assert_eq!("tcp://127.0.0.1:40123".parse::<Address>().unwrap(), address);

        let v6 = Address::new("[::1]:9000".parse().unwrap());
        assert_eq!(v6.to_string().parse::<Address>().unwrap(), v6);
    }

    #[test]
    fn test_localhost_resolves_to_loopback() {
        let address: Address = "tcp://localhost:8123".parse().unwrap();
        assert_eq!(address.socket_addr(), "127.0.0.1:8123".parse().unwrap());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!("http://127.0.0.1:80".parse::<Address>().is_err());
        assert!("tcp://127.0.0.1".parse::<Address>().is_err());
        assert!("tcp://build-server:80".parse::<Address>().is_err());
        assert!("not an address".parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let address: Address = "tcp://127.0.0.1:5555".parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"tcp://127.0.0.1:5555\"");

        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, address);
        assert!(serde_json::from_str::<Address>("\"udp://127.0.0.1:1\"").is_err());
    }
}
