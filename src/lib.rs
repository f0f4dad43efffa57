//! # Veiltun
//!
//! Client-side relay engine for an encrypted proxy tunnel.
//!
//! Veiltun accepts local SOCKS5/HTTP CONNECT requests, negotiates an
//! encrypted session over a pooled connection to a remote relay endpoint,
//! and shuttles bytes in both directions until either side closes.
//!
//! ## Features
//!
//! - **Authenticated encryption** (AES-256-GCM or ChaCha20-Poly1305)
//! - **Connection pooling** with health-aware reuse
//! - **Traffic padding** on the session handshake
//! - **SOCKS5 and HTTP CONNECT** local proxies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Local Proxy Front Ends                 │
//! │               (SOCKS5, HTTP CONNECT)                 │
//! ├─────────────────────────────────────────────────────┤
//! │                  Relay Session                       │
//! │    (handshake frame, duplex copy, byte counters)     │
//! ├─────────────────────────────────────────────────────┤
//! │                  Cipher Stream                       │
//! │         (AEAD framing, FIN-based session end)        │
//! ├─────────────────────────────────────────────────────┤
//! │                Connection Pool                       │
//! │      (TCP reuse, eviction of poisoned sockets)       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod crypto;
pub mod pool;
pub mod protocol;
pub mod proxy;
pub mod relay;
pub mod stats;
pub mod tunnel;

pub use config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default remote relay port
pub const DEFAULT_PORT: u16 = 9633;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Pool error: {0}")]
    Pool(#[from] pool::PoolError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] tunnel::TunnelError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] proxy::ProxyError),

    #[error("Configuration error: {0}")]
    Config(String),
}
