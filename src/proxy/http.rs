//! HTTP CONNECT proxy implementation
//!
//! Accepts `CONNECT host:port` requests only; plain HTTP forwarding is
//! not provided. The 200 response is sent before the handler runs, same
//! as the SOCKS5 front end.

use super::{Address, ProxyError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// HTTP CONNECT proxy server
pub struct HttpProxyServer {
    listener: TcpListener,
}

impl HttpProxyServer {
    /// Create a new HTTP proxy server
    pub async fn bind(addr: &str) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP proxy server listening on {}", addr);

        Ok(Self { listener })
    }

    /// Accept and handle incoming connections
    pub async fn run<F, Fut>(&self, handler: F) -> Result<(), ProxyError>
    where
        F: Fn(TcpStream, Address) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future<Output = Result<(), ProxyError>> + Send,
    {
        loop {
            let (stream, peer_addr) = self.listener.accept().await?;
            debug!("New HTTP proxy connection from {}", peer_addr);

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, handler).await {
                    error!("HTTP proxy connection error: {}", e);
                }
            });
        }
    }

    async fn handle_connection<F, Fut>(stream: TcpStream, handler: F) -> Result<(), ProxyError>
    where
        F: Fn(TcpStream, Address) -> Fut,
        Fut: std::future::Future<Output = Result<(), ProxyError>>,
    {
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default();
        let target = parts.next().unwrap_or_default().to_string();

        if method != "CONNECT" {
            let mut stream = reader.into_inner();
            stream
                .write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n")
                .await?;
            return Err(ProxyError::InvalidRequest(format!(
                "method {} not supported",
                method
            )));
        }

        // Drain remaining request headers
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            if line.trim().is_empty() {
                break;
            }
        }

        let address = parse_connect_target(&target)?;
        let mut stream = reader.into_inner();

        debug!("HTTP CONNECT to {}", address);
        stream
            .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
            .await?;

        handler(stream, address).await
    }
}

/// Parse a `host:port` CONNECT target
fn parse_connect_target(target: &str) -> Result<Address, ProxyError> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::InvalidRequest(format!("missing port in {:?}", target)))?;

    let port: u16 = port
        .parse()
        .map_err(|_| ProxyError::InvalidRequest(format!("bad port in {:?}", target)))?;

    if host.is_empty() {
        return Err(ProxyError::InvalidRequest(format!(
            "missing host in {:?}",
            target
        )));
    }

    if let Ok(ip) = host.parse::<std::net::Ipv4Addr>() {
        return Ok(Address::Ipv4(ip.octets(), port));
    }
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        if let Ok(ip) = inner.parse::<std::net::Ipv6Addr>() {
            return Ok(Address::Ipv6(ip.octets(), port));
        }
    }

    Ok(Address::Domain(host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_parse_connect_target() {
        assert!(matches!(
            parse_connect_target("example.com:443").unwrap(),
            Address::Domain(host, 443) if host == "example.com"
        ));
        assert!(matches!(
            parse_connect_target("10.0.0.1:80").unwrap(),
            Address::Ipv4([10, 0, 0, 1], 80)
        ));
        assert!(matches!(
            parse_connect_target("[::1]:8080").unwrap(),
            Address::Ipv6(_, 8080)
        ));

        assert!(parse_connect_target("no-port").is_err());
        assert!(parse_connect_target(":443").is_err());
        assert!(parse_connect_target("host:notaport").is_err());
    }

    #[tokio::test]
    async fn test_connect_roundtrip() {
        let server = HttpProxyServer::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.listener.local_addr().unwrap().to_string();

        let (target_tx, mut target_rx) = tokio::sync::mpsc::channel::<String>(1);
        tokio::spawn(async move {
            server
                .run(move |_stream, address| {
                    let target_tx = target_tx.clone();
                    async move {
                        target_tx.send(address.to_string()).await.ok();
                        Ok(())
                    }
                })
                .await
                .ok();
        });

        let mut client = TcpStream::connect(&server_addr).await.unwrap();
        client
            .write_all(b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n")
            .await
            .unwrap();

        let mut response = [0u8; 39];
        client.read_exact(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 200"));

        assert_eq!(target_rx.recv().await.unwrap(), "example.com:443");
    }
}
