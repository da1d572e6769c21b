//! Packet types.
//!
//! A [`Packet`] is the unit the session layer exchanges with a transport.
//! Its wire form belongs to the [`Codec`](super::Codec); this module only
//! defines the typed shape.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// PacketType
// ============================================================================

/// Packet kind.
///
/// Numeric codes follow the engine packet table (`open = 0` .. `noop = 6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    /// Handshake data sent once the session opens.
    Open,
    /// Request to close the connection.
    Close,
    /// Heartbeat request.
    Ping,
    /// Heartbeat answer.
    Pong,
    /// Application message.
    Message,
    /// Carrier switch marker.
    Upgrade,
    /// Filler that carries nothing.
    Noop,
}

impl PacketType {
    /// All packet types in code order.
    pub const ALL: [Self; 7] = [
        Self::Open,
        Self::Close,
        Self::Ping,
        Self::Pong,
        Self::Message,
        Self::Upgrade,
        Self::Noop,
    ];

    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Close => 1,
            Self::Ping => 2,
            Self::Pong => 3,
            Self::Message => 4,
            Self::Upgrade => 5,
            Self::Noop => 6,
        }
    }

    /// Looks up a packet type by numeric code.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Open),
            1 => Some(Self::Close),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Message),
            5 => Some(Self::Upgrade),
            6 => Some(Self::Noop),
            _ => None,
        }
    }

    /// Returns the lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Message => "message",
            Self::Upgrade => "upgrade",
            Self::Noop => "noop",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacketType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::protocol(format!("unknown packet type: {s}")))
    }
}

// ============================================================================
// PacketData
// ============================================================================

/// Packet payload: text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketData {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
}

impl PacketData {
    /// Returns `true` for binary data.
    #[inline]
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Returns the text, if this is text data.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for PacketData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PacketData {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for PacketData {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for PacketData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

// ============================================================================
// Packet
// ============================================================================

/// One protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet kind.
    pub packet_type: PacketType,
    /// Optional payload.
    pub data: Option<PacketData>,
}

impl Packet {
    /// Creates a packet without payload.
    #[inline]
    #[must_use]
    pub const fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            data: None,
        }
    }

    /// Creates a packet with payload.
    #[inline]
    #[must_use]
    pub fn with_data(packet_type: PacketType, data: impl Into<PacketData>) -> Self {
        Self {
            packet_type,
            data: Some(data.into()),
        }
    }

    /// Creates a `message` packet.
    #[inline]
    #[must_use]
    pub fn message(data: impl Into<PacketData>) -> Self {
        Self::with_data(PacketType::Message, data)
    }

    /// Creates a `close` packet.
    #[inline]
    #[must_use]
    pub const fn close() -> Self {
        Self::new(PacketType::Close)
    }

    /// Creates a `noop` packet.
    #[inline]
    #[must_use]
    pub const fn noop() -> Self {
        Self::new(PacketType::Noop)
    }

    /// Returns `true` for a `close` packet.
    #[inline]
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.packet_type == PacketType::Close
    }

    /// Returns `true` if the payload is binary.
    #[inline]
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.data.as_ref().is_some_and(PacketData::is_binary)
    }
}

// ============================================================================
// Tests
// ============================================================================
