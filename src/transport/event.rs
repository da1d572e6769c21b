//! Events a transport reports to the session layer.
//!
//! | Event | Payload | When |
//! |-------|---------|------|
//! | `Packet` | decoded [`Packet`] | inbound data decoded |
//! | `Error` | [`TransportError`] | recoverable carrier failure |
//! | `Close` | none | transport reached `closed` |
//! | `Drain` | none | a writable channel became available |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::listeners::Event;
use crate::protocol::Packet;

// ============================================================================
// Constants
// ============================================================================

/// Type tag carried by every [`TransportError`].
pub const TRANSPORT_ERROR_TYPE: &str = "TransportError";

// ============================================================================
// TransportError
// ============================================================================

/// Error payload of [`TransportEvent::Error`].
///
/// # Format
///
/// ```json
/// { "type": "TransportError", "description": "overlap from client" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    /// Type tag, always `"TransportError"`.
    #[serde(rename = "type")]
    pub error_type: String,

    /// Human readable description.
    pub description: String,
}

impl TransportError {
    /// Creates a transport error with the given description.
    #[inline]
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            error_type: TRANSPORT_ERROR_TYPE.to_owned(),
            description: description.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.description)
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Discriminant used to register transport listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Inbound packet.
    Packet,
    /// Recoverable error.
    Error,
    /// Terminal close.
    Close,
    /// Writable channel available.
    Drain,
}

// ============================================================================
// TransportEvent
// ============================================================================

/// An event emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A decoded inbound packet.
    Packet(Packet),
    /// A recoverable carrier failure.
    Error(TransportError),
    /// The transport reached `closed`.
    Close,
    /// A writable channel became available; flush buffered packets.
    Drain,
}

impl Event for TransportEvent {
    type Kind = EventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::Packet(_) => EventKind::Packet,
            Self::Error(_) => EventKind::Error,
            Self::Close => EventKind::Close,
            Self::Drain => EventKind::Drain,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
