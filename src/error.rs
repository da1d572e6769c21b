//! Error types for the transport layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use engine_transport::{Error, Result};
//!
//! async fn flush(transport: &dyn Transport, packets: Vec<Packet>) -> Result<()> {
//!     transport.send(packets).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnsupportedPayload`] |
//! | Binding | [`Error::NotWritable`], [`Error::UpgradeMissing`] |
//! | Exchange | [`Error::ResponseAlreadyEnded`] |
//! | Socket | [`Error::Socket`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ExchangeId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a transport is constructed with inconsistent options.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or undecodable input.
    ///
    /// Returned when inbound data cannot be turned into packets, or when a
    /// client breaks the exchange discipline (e.g. overlapping polls).
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Payload shape not supported by the carrier.
    ///
    /// Returned when binary data is routed to a text-only framing.
    #[error("Unsupported payload for {transport}: {message}")]
    UnsupportedPayload {
        /// Transport name.
        transport: &'static str,
        /// Description of the rejected payload.
        message: String,
    },

    // ========================================================================
    // Binding Errors
    // ========================================================================
    /// No channel is currently bound to carry outbound data.
    ///
    /// Returned when `send` is called while the transport is not writable.
    #[error("Transport {transport} is not writable")]
    NotWritable {
        /// Transport name.
        transport: &'static str,
    },

    /// Upgrade exchange arrived without an upgraded socket.
    ///
    /// The exchange is answered with a 500 and no carrier is bound.
    #[error("Exchange {exchange_id} carries no upgraded socket")]
    UpgradeMissing {
        /// The offending exchange.
        exchange_id: ExchangeId,
    },

    // ========================================================================
    // Exchange Errors
    // ========================================================================
    /// The response was already finalized (ended or aborted).
    ///
    /// Expected when two completion paths race; callers discard it.
    #[error("Response for exchange {exchange_id} already ended")]
    ResponseAlreadyEnded {
        /// The exchange whose response was already finalized.
        exchange_id: ExchangeId,
    },

    // ========================================================================
    // Socket Errors
    // ========================================================================
    /// Frame-level send or receive failure on a live socket.
    #[error("Socket error: {message}")]
    Socket {
        /// Description of the socket failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unsupported payload error.
    #[inline]
    pub fn unsupported_payload(transport: &'static str, message: impl Into<String>) -> Self {
        Self::UnsupportedPayload {
            transport,
            message: message.into(),
        }
    }

    /// Creates a not writable error.
    #[inline]
    pub fn not_writable(transport: &'static str) -> Self {
        Self::NotWritable { transport }
    }

    /// Creates an upgrade missing error.
    #[inline]
    pub fn upgrade_missing(exchange_id: ExchangeId) -> Self {
        Self::UpgradeMissing { exchange_id }
    }

    /// Creates a response already ended error.
    #[inline]
    pub fn response_already_ended(exchange_id: ExchangeId) -> Self {
        Self::ResponseAlreadyEnded { exchange_id }
    }

    /// Creates a socket error.
    #[inline]
    pub fn socket(message: impl Into<String>) -> Self {
        Self::Socket {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error reports an already finalized response.
    #[inline]
    #[must_use]
    pub fn is_response_finalized(&self) -> bool {
        matches!(self, Self::ResponseAlreadyEnded { .. })
    }

    /// Returns `true` if this is a socket-level error.
    #[inline]
    #[must_use]
    pub fn is_socket_error(&self) -> bool {
        matches!(self, Self::Socket { .. } | Self::WebSocket(_) | Self::Io(_))
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are scoped to one frame or one exchange and leave
    /// the connection usable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::Socket { .. }
                | Self::NotWritable { .. }
                | Self::ResponseAlreadyEnded { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
