//! Listen-address parsing.
//!
//! Addresses use the `host:port` form where an empty host (`":50051"`) means
//! every interface of the requested family.

use crate::error::{KernelError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of listener to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
    Unix,
}

impl Network {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Unix => "unix",
        }
    }

    const fn accepts(self, ip: IpAddr) -> bool {
        match self {
            Self::Tcp => true,
            Self::Tcp4 => ip.is_ipv4(),
            Self::Tcp6 => ip.is_ipv6(),
            Self::Unix => false,
        }
    }
}

impl FromStr for Network {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "unix" => Ok(Self::Unix),
            _ => Err(KernelError::UnknownNetwork { network: s.to_owned() }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved address to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolves `addr` for `network`. Host names are looked up and the first
/// address of the requested family is used.
pub fn resolve_listen_addr(network: Network, addr: &str) -> Result<ListenAddr> {
    let invalid = |message: &'static str| KernelError::InvalidAddress {
        addr: addr.to_owned(),
        message: message.into(),
        context: Some(network.as_str().into()),
    };

    if network == Network::Unix {
        if addr.is_empty() {
            return Err(invalid("socket path is empty"));
        }
        return Ok(ListenAddr::Unix(addr.into()));
    }

    let (host, port) = addr.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
    let port: u16 = port.parse().map_err(|_| invalid("port is not a number in 0..=65535"))?;
    let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);

    if host.is_empty() {
        let ip = match network {
            Network::Tcp6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        return Ok(ListenAddr::Tcp(SocketAddr::new(ip, port)));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if !network.accepts(ip) {
            return Err(invalid("address family does not match network"));
        }
        return Ok(ListenAddr::Tcp(SocketAddr::new(ip, port)));
    }

    (host, port)
        .to_socket_addrs()
        .map_err(|source| KernelError::InvalidAddress {
            addr: addr.to_owned(),
            message: source.to_string().into(),
            context: Some(network.as_str().into()),
        })?
        .find(|candidate| network.accepts(candidate.ip()))
        .map(ListenAddr::Tcp)
        .ok_or_else(|| invalid("host has no address of the requested family"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_host_binds_every_interface() {
        assert_eq!(
            resolve_listen_addr(Network::Tcp, ":50051").ok(),
            Some(ListenAddr::Tcp("0.0.0.0:50051".parse().expect("addr")))
        );
        assert_eq!(
            resolve_listen_addr(Network::Tcp6, ":8443").ok(),
            Some(ListenAddr::Tcp("[::]:8443".parse().expect("addr")))
        );
    }

    #[test]
    fn test_literal_addresses() {
        assert_eq!(
            resolve_listen_addr(Network::Tcp, "[::1]:80").ok(),
            Some(ListenAddr::Tcp("[::1]:80".parse().expect("addr")))
        );
        assert!(resolve_listen_addr(Network::Tcp4, "[::1]:80").is_err());
        assert!(resolve_listen_addr(Network::Tcp, "127.0.0.1").is_err());
        assert!(resolve_listen_addr(Network::Tcp, "127.0.0.1:99999").is_err());
    }

    #[test]
    fn test_localhost_resolves() {
        let resolved = resolve_listen_addr(Network::Tcp4, "localhost:0").expect("resolve");
        assert!(matches!(resolved, ListenAddr::Tcp(addr) if addr.ip().is_loopback()));
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("TCP6".parse::<Network>().ok(), Some(Network::Tcp6));
        assert_eq!("unix".parse::<Network>().ok(), Some(Network::Unix));
        assert!(matches!(
            "unixpacket".parse::<Network>(),
            Err(KernelError::UnknownNetwork { .. })
        ));
        assert!(matches!(
            resolve_listen_addr(Network::Unix, "/tmp/app.sock"),
            Ok(ListenAddr::Unix(_))
        ));
    }
}
