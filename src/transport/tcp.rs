//! Plain TCP transport, the stock inbound link.

use super::{Connection, Listener, Transport, TransportError};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::debug;

/// TCP transport
pub struct TcpTransport {
    nodelay: bool,
}

impl TcpTransport {
    /// Create a new TCP transport. Accepted connections get `TCP_NODELAY`
    /// to avoid delays on the small handshake writes.
    pub fn new() -> Self {
        Self { nodelay: true }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn bind(&self, addr: &str) -> Result<Box<dyn Listener>, TransportError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind(format!("{addr}: {e}")))?;
        Ok(Box::new(TcpAcceptor {
            inner,
            nodelay: self.nodelay,
        }))
    }
}

struct TcpAcceptor {
    inner: TcpListener,
    nodelay: bool,
}

#[async_trait]
impl Listener for TcpAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, peer_addr) = self.inner.accept().await?;
        if self.nodelay {
            stream.set_nodelay(true).ok();
        }
        debug!("accepted connection from {}", peer_addr);
        Ok(Box::new(stream))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.local_addr()?)
    }
}
