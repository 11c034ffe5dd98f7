//! Outbound connector
//!
//! One blocking-style connect attempt per session, no retry, platform
//! default timeout. Resolution failures, refusals, and timeouts all surface
//! as the same error shape; the session layer turns it into the SOCKS
//! failure reply.

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

/// Outbound connect failure, carrying the destination for the log line.
#[derive(Debug, Error)]
#[error("connect to {host}:{port} failed: {source}")]
pub struct ConnectError {
    pub host: String,
    pub port: u16,
    #[source]
    pub source: std::io::Error,
}

/// Open a TCP connection to the destination a CONNECT request named.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, ConnectError> {
    match TcpStream::connect((host, port)).await {
        Ok(stream) => {
            stream.set_nodelay(true).ok();
            debug!("connected to {}:{}", host, port);
            Ok(stream)
        }
        Err(source) => Err(ConnectError {
            host: host.to_string(),
            port,
            source,
        }),
    }
}
