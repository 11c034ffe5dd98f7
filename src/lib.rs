//! # Murmur Proxy
//!
//! A small local SOCKS5 proxy that serves connections arriving over a
//! pluggable stream transport and relays them to real TCP destinations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Session Lifecycle Controller            │
//! │          (start/stop, status + log events)           │
//! ├─────────────────────────────────────────────────────┤
//! │               Connection Dispatcher                  │
//! │          (accept loop, one task per client)          │
//! ├─────────────────────────────────────────────────────┤
//! │             SOCKS5 Handshake + Connector             │
//! │        (greeting, CONNECT request, outbound TCP)     │
//! ├─────────────────────────────────────────────────────┤
//! │                   Relay Engine                       │
//! │        (full-duplex byte copy until either EOF)      │
//! ├─────────────────────────────────────────────────────┤
//! │                  Transport Layer                     │
//! │        (TCP out of the box, anything stream-y)       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Only the CONNECT command with IPv4 or domain-name targets is supported;
//! unsupported requests fail closed.

pub mod config;
pub mod connector;
pub mod relay;
pub mod server;
pub mod socks;
pub mod transport;

pub use config::Config;
pub use server::ProxyServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default SOCKS5 listen port
pub const DEFAULT_PORT: u16 = 1080;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Handshake error: {0}")]
    Handshake(#[from] socks::HandshakeError),

    #[error("Connect error: {0}")]
    Connect(#[from] connector::ConnectError),

    #[error("Configuration error: {0}")]
    Config(String),
}
