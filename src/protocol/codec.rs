//! Codec interface.
//!
//! Transports never build wire bytes themselves: a single packet, or an
//! ordered batch of packets (a payload), goes through a [`Codec`] supplied
//! by the embedding server.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;

use crate::error::Result;

use super::Packet;

// ============================================================================
// Encoded
// ============================================================================

/// Wire form produced or consumed by a [`Codec`].
///
/// The shape decides framing downstream: text goes out as `text/plain` or a
/// text frame, binary as `application/octet-stream` or a binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// Text wire form.
    Text(String),
    /// Binary wire form.
    Binary(Bytes),
}

impl Encoded {
    /// Returns `true` for binary wire data.
    #[inline]
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Returns the byte length of the wire data.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if there is no wire data.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts into raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for Encoded {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Encoded {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Encoded {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

// ============================================================================
// DecodedPacket
// ============================================================================

/// One packet out of a decoded payload, with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    /// The packet.
    pub packet: Packet,
    /// Zero-based position in the payload.
    pub index: usize,
    /// Number of packets in the payload.
    pub total: usize,
}

// ============================================================================
// Codec
// ============================================================================

/// Packet and payload encoder/decoder.
///
/// Implementations must be order-preserving:
/// `decode_payload(encode_payload(p))` yields `p` in the same order.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a single packet.
    fn encode_packet(&self, packet: &Packet, supports_binary: bool) -> Encoded;

    /// Decodes a single packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`](crate::Error::Protocol) on malformed input.
    fn decode_packet(&self, data: Encoded) -> Result<Packet>;

    /// Encodes an ordered batch of packets into one payload.
    fn encode_payload(&self, packets: &[Packet], supports_binary: bool) -> Encoded;

    /// Decodes a payload into its packets, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`](crate::Error::Protocol) on malformed input.
    fn decode_payload(&self, data: Encoded) -> Result<Vec<DecodedPacket>>;
}

// ============================================================================
// Tests
// ============================================================================
