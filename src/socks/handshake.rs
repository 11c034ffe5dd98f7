//! SOCKS5 handshake state machine
//!
//! Drives a client stream through greeting and CONNECT request. The states
//! are implicit in control flow: expect-greeting, expect-request, then the
//! caller moves on to connecting and relaying. Failure at any point returns
//! an error without emitting protocol bytes; per RFC 1928 a bad greeting is
//! an unrecoverable framing error and the only honest response is to close.

use super::{
    encode_reply, AddressType, Command, HandshakeError, HandshakeRequest, Reply, TargetAddr,
    METHOD_NO_AUTH, SOCKS_VERSION,
};
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Read the greeting and CONNECT request from a client stream.
///
/// On a valid greeting offering NO-AUTH this writes exactly `[0x05, 0x00]`
/// before reading the request. Nothing is written on any failure path; the
/// caller closes the stream by dropping it.
pub async fn negotiate<S>(stream: &mut S) -> Result<HandshakeRequest, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // --- Greeting ---
    let version = stream.read_u8().await?;
    if version != SOCKS_VERSION {
        return Err(HandshakeError::InvalidVersion(version));
    }

    let nmethods = stream.read_u8().await? as usize;
    let mut methods = vec![0u8; nmethods];
    stream.read_exact(&mut methods).await?;

    if !methods.contains(&METHOD_NO_AUTH) {
        return Err(HandshakeError::NoAcceptableAuth);
    }

    stream.write_all(&[SOCKS_VERSION, METHOD_NO_AUTH]).await?;
    stream.flush().await?;

    // --- Connect request ---
    let version = stream.read_u8().await?;
    if version != SOCKS_VERSION {
        return Err(HandshakeError::InvalidVersion(version));
    }

    // Only CONNECT parses; BIND and UDP ASSOCIATE error out here
    Command::try_from(stream.read_u8().await?)?;

    let _reserved = stream.read_u8().await?;

    let addr = match AddressType::try_from(stream.read_u8().await?)? {
        AddressType::Ipv4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            TargetAddr::Ipv4(Ipv4Addr::from(octets))
        }
        AddressType::Domain => {
            let len = stream.read_u8().await? as usize;
            let mut raw = vec![0u8; len];
            stream.read_exact(&mut raw).await?;
            let domain = String::from_utf8(raw).map_err(|_| HandshakeError::InvalidDomain)?;
            TargetAddr::Domain(domain)
        }
    };

    let port = stream.read_u16().await?;

    let request = HandshakeRequest { addr, port };
    debug!("parsed CONNECT request for {}", request);
    Ok(request)
}

/// Write the 10-byte connect reply and flush it.
pub async fn send_reply<S>(stream: &mut S, reply: Reply) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode_reply(reply)).await?;
    stream.flush().await
}
