//! Local proxy front ends
//!
//! Provides:
//! - SOCKS5 proxy server (CONNECT only)
//! - HTTP CONNECT proxy server
//!
//! Both accept local connections, parse the target address, and hand
//! `(stream, address)` pairs to a caller-supplied handler. The handler is
//! where the tunnel session runs; the front ends never see tunnel bytes.

mod http;
mod socks5;

pub use http::HttpProxyServer;
pub use socks5::Socks5Server;

use thiserror::Error;

/// Proxy errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SOCKS version: {0}")]
    InvalidSocksVersion(u8),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u8),

    #[error("Address type not supported: {0}")]
    UnsupportedAddressType(u8),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Relay failed: {0}")]
    RelayFailed(String),
}

/// Proxy target address
#[derive(Debug, Clone)]
pub enum Address {
    /// IPv4 address and port
    Ipv4([u8; 4], u16),
    /// IPv6 address and port
    Ipv6([u8; 16], u16),
    /// Domain name and port
    Domain(String, u16),
}

impl Address {
    /// Get the port
    pub fn port(&self) -> u16 {
        match self {
            Address::Ipv4(_, port) => *port,
            Address::Ipv6(_, port) => *port,
            Address::Domain(_, port) => *port,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Ipv4(ip, port) => {
                write!(f, "{}:{}", std::net::Ipv4Addr::from(*ip), port)
            }
            Address::Ipv6(ip, port) => {
                write!(f, "[{}]:{}", std::net::Ipv6Addr::from(*ip), port)
            }
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        assert_eq!(
            Address::Ipv4([93, 184, 216, 34], 443).to_string(),
            "93.184.216.34:443"
        );
        assert_eq!(
            Address::Domain("example.com".to_string(), 443).to_string(),
            "example.com:443"
        );

        let ip6 = Address::Ipv6([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1], 80);
        assert_eq!(ip6.to_string(), "[::1]:80");
    }
}
