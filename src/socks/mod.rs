//! SOCKS5 protocol types (RFC 1928 subset)
//!
//! Only the pieces this proxy speaks: NO-AUTH method selection, the CONNECT
//! command, and IPv4/domain targets. Everything else fails closed.

mod handshake;

pub use handshake::{negotiate, send_reply};

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// SOCKS5 version byte
pub const SOCKS_VERSION: u8 = 0x05;

/// The NO AUTHENTICATION REQUIRED method id
pub const METHOD_NO_AUTH: u8 = 0x00;

/// Handshake failures. None of these produce reply bytes on the wire; a
/// violated handshake just closes.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid SOCKS version: {0:#04x}")]
    InvalidVersion(u8),

    #[error("no acceptable auth method")]
    NoAcceptableAuth,

    #[error("unsupported command: {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("unsupported address type: {0:#04x}")]
    UnsupportedAddressType(u8),

    #[error("domain name is not valid UTF-8")]
    InvalidDomain,
}

/// SOCKS5 commands. BIND and UDP ASSOCIATE are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Connect = 0x01,
}

impl TryFrom<u8> for Command {
    type Error = HandshakeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Connect),
            other => Err(HandshakeError::UnsupportedCommand(other)),
        }
    }
}

/// Address types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressType {
    Ipv4 = 0x01,
    Domain = 0x03,
}

impl TryFrom<u8> for AddressType {
    type Error = HandshakeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(AddressType::Ipv4),
            0x03 => Ok(AddressType::Domain),
            other => Err(HandshakeError::UnsupportedAddressType(other)),
        }
    }
}

/// Reply codes sent in the 10-byte connect reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
}

/// Requested destination address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ipv4(Ipv4Addr),
    Domain(String),
}

/// A fully validated CONNECT request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub addr: TargetAddr,
    pub port: u16,
}

impl HandshakeRequest {
    /// Destination host as text, the form the connector resolves.
    pub fn host(&self) -> String {
        match &self.addr {
            TargetAddr::Ipv4(ip) => ip.to_string(),
            TargetAddr::Domain(domain) => domain.clone(),
        }
    }
}

impl fmt::Display for HandshakeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host(), self.port)
    }
}

/// Build the fixed connect reply. The proxy never reports a real bound
/// address, so ATYP is IPv4 with the address and port zeroed.
pub fn encode_reply(reply: Reply) -> [u8; 10] {
    [
        SOCKS_VERSION,
        reply as u8,
        0x00,
        AddressType::Ipv4 as u8,
        0, 0, 0, 0, // 0.0.0.0
        0, 0, // port 0
    ]
}
