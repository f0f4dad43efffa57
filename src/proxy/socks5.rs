//! SOCKS5 proxy implementation (RFC 1928)
//!
//! CONNECT only; BIND and UDP ASSOCIATE are answered with "command not
//! supported". The reply is sent before the handler runs, because the
//! actual connection to the target happens remotely through the tunnel.

use super::{Address, ProxyError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// SOCKS5 version
const SOCKS_VERSION: u8 = 0x05;

/// No-authentication method code
const METHOD_NO_AUTH: u8 = 0x00;

/// No-acceptable-methods code
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

/// SOCKS5 commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

impl TryFrom<u8> for Command {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Connect),
            0x02 => Ok(Command::Bind),
            0x03 => Ok(Command::UdpAssociate),
            _ => Err(ProxyError::UnsupportedCommand(value)),
        }
    }
}

/// Reply codes
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

/// SOCKS5 proxy server
pub struct Socks5Server {
    listener: TcpListener,
}

impl Socks5Server {
    /// Create a new SOCKS5 server
    pub async fn bind(addr: &str) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(addr).await?;
        info!("SOCKS5 server listening on {}", addr);

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
            debug!("New SOCKS5 connection from {}", peer_addr);

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, handler).await {
                    error!("SOCKS5 connection error: {}", e);
                }
            });
        }
    }

    async fn handle_connection<F, Fut>(mut stream: TcpStream, handler: F) -> Result<(), ProxyError>
    where
        F: Fn(TcpStream, Address) -> Fut,
        Fut: std::future::Future<Output = Result<(), ProxyError>>,
    {
        let mut buf = [0u8; 262];

        // Greeting: version + offered auth methods
        stream.read_exact(&mut buf[..2]).await?;
        if buf[0] != SOCKS_VERSION {
            return Err(ProxyError::InvalidSocksVersion(buf[0]));
        }

        let nmethods = buf[1] as usize;
        stream.read_exact(&mut buf[..nmethods]).await?;

        if !buf[..nmethods].contains(&METHOD_NO_AUTH) {
            stream
                .write_all(&[SOCKS_VERSION, METHOD_NO_ACCEPTABLE])
                .await?;
            return Err(ProxyError::InvalidRequest(
                "no acceptable auth method".to_string(),
            ));
        }
        stream.write_all(&[SOCKS_VERSION, METHOD_NO_AUTH]).await?;

        // Request: version, command, reserved, address type
        stream.read_exact(&mut buf[..4]).await?;
        if buf[0] != SOCKS_VERSION {
            return Err(ProxyError::InvalidSocksVersion(buf[0]));
        }

        let command = Command::try_from(buf[1]);
        let addr_type = buf[3];

        let address = match addr_type {
            0x01 => {
                let mut ip = [0u8; 4];
                stream.read_exact(&mut ip).await?;
                Address::Ipv4(ip, read_port(&mut stream).await?)
            }
            0x03 => {
                stream.read_exact(&mut buf[..1]).await?;
                let len = buf[0] as usize;
                stream.read_exact(&mut buf[..len]).await?;
                let domain = String::from_utf8_lossy(&buf[..len]).to_string();
                Address::Domain(domain, read_port(&mut stream).await?)
            }
            0x04 => {
                let mut ip = [0u8; 16];
                stream.read_exact(&mut ip).await?;
                Address::Ipv6(ip, read_port(&mut stream).await?)
            }
            _ => {
                stream
                    .write_all(&Self::make_reply(Reply::AddressTypeNotSupported))
                    .await?;
                return Err(ProxyError::UnsupportedAddressType(addr_type));
            }
        };

        match command {
            Ok(Command::Connect) => {
                debug!("SOCKS5 CONNECT to {}", address);
                stream.write_all(&Self::make_reply(Reply::Succeeded)).await?;
                handler(stream, address).await
            }
            Ok(other) => {
                stream
                    .write_all(&Self::make_reply(Reply::CommandNotSupported))
                    .await?;
                Err(ProxyError::UnsupportedCommand(other as u8))
            }
            Err(e) => {
                stream
                    .write_all(&Self::make_reply(Reply::CommandNotSupported))
                    .await?;
                Err(e)
            }
        }
    }

    /// Reply with a zeroed IPv4 bind address; the real connection lives
    /// on the remote side of the tunnel
    fn make_reply(reply: Reply) -> [u8; 10] {
        [
            SOCKS_VERSION,
            reply as u8,
            0x00, // reserved
            0x01, // IPv4
            0, 0, 0, 0, // address
            0, 0, // port
        ]
    }
}

async fn read_port(stream: &mut TcpStream) -> Result<u16, ProxyError> {
    let mut port_buf = [0u8; 2];
    stream.read_exact(&mut port_buf).await?;
    Ok(u16::from_be_bytes(port_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connect_and_request(server_addr: &str, request: &[u8]) -> (TcpStream, Vec<u8>) {
        let mut client = TcpStream::connect(server_addr).await.unwrap();

        // Greeting: no-auth
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut method_reply = [0u8; 2];
        client.read_exact(&mut method_reply).await.unwrap();
        assert_eq!(method_reply, [0x05, 0x00]);

        client.write_all(request).await.unwrap();
        let mut reply = vec![0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        (client, reply)
    }

    #[tokio::test]
    async fn test_connect_delivers_target_to_handler() {
        let server = Socks5Server::bind("127.0.0.1:0").await.unwrap();
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

        // CONNECT example.com:443 (domain form)
        let mut request = vec![0x05, 0x01, 0x00, 0x03, 11];
        request.extend_from_slice(b"example.com");
        request.extend_from_slice(&443u16.to_be_bytes());

        let (_client, reply) = connect_and_request(&server_addr, &request).await;
        assert_eq!(reply[1], 0x00); // succeeded

        let target = target_rx.recv().await.unwrap();
        assert_eq!(target, "example.com:443");
    }

    #[tokio::test]
    async fn test_udp_associate_rejected() {
        let server = Socks5Server::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            server.run(|_stream, _address| async { Ok(()) }).await.ok();
        });

        let request = [0x05, 0x03, 0x00, 0x01, 127, 0, 0, 1, 0, 53];
        let (_client, reply) = connect_and_request(&server_addr, &request).await;
        assert_eq!(reply[1], Reply::CommandNotSupported as u8);
    }
}
