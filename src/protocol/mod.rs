//! Packet types and the codec interface.
//!
//! This module defines the typed packet model shared by every carrier and
//! the [`Codec`] seam through which transports reach the wire format.
//!
//! # Protocol Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Packet`] | One protocol packet (`type` + optional data) |
//! | [`Encoded`] | Wire form: text or binary |
//! | [`Codec`] | Packet and payload encode/decode (supplied by the server) |
//!
//! A payload is an ordered batch of packets carried by one long-polling
//! exchange. WebSocket frames always carry exactly one packet.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Codec trait and wire form |
//! | `packet` | Packet, packet type, packet data |

// ============================================================================
// Submodules
// ============================================================================

/// Codec trait and wire form.
pub mod codec;

/// Packet types.
pub mod packet;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Codec, DecodedPacket, Encoded};
pub use packet::{Packet, PacketData, PacketType};
