//! Transport layer
//!
//! The proxy core never touches sockets directly for inbound traffic; it
//! only needs a listener that yields accepted duplex byte streams. That seam
//! lets the same core run over plain TCP, a unix socket, or any other
//! stream-shaped link.

mod tcp;

pub use tcp::TcpTransport;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport layer errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("bind failed: {0}")]
    Bind(String),

    #[error("listener closed")]
    Closed,
}

/// An accepted duplex byte stream.
///
/// Blanket-implemented for anything tokio can read and write; closing is
/// dropping (or shutting down the write half), both of which are idempotent.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

/// A bound listening endpoint. Dropping it closes the socket.
#[async_trait]
pub trait Listener: Send {
    /// Wait for the next inbound connection.
    async fn accept(&mut self) -> Result<Box<dyn Connection>, TransportError>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

impl std::fmt::Debug for dyn Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Trait for transport implementations
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind a listening endpoint on the given address.
    async fn bind(&self, addr: &str) -> Result<Box<dyn Listener>, TransportError>;
}
