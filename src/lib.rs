//! Engine transports - long-polling and WebSocket carriers behind one
//! packet-oriented interface.
//!
//! This library keeps a single logical real-time connection alive across
//! either repeated short HTTP exchanges (long-polling) or one persistent
//! socket (WebSocket), while preserving packet order and coordinating an
//! orderly close.
//!
//! # Architecture
//!
//! The crate sits between two external collaborators:
//!
//! - **HTTP layer**: accepts requests, builds an [`Exchange`] per request and
//!   hands it to the connection's transport via [`Transport::bind_exchange`]
//! - **Session layer**: listens for [`TransportEvent`]s and pushes packets
//!   through [`Transport::send`]
//!
//! Key design principles:
//!
//! - One transport per connection, surviving every exchange bound to it
//! - At most one outstanding poll per connection; a second is rejected
//! - A close requested while no channel is writable is deferred, never lost
//! - Exchanges are released through response hooks, each unregistered once
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use engine_transport::{EventKind, Exchange, Transport, TransportConfig, TransportEvent,
//!     XhrPollingTransport};
//!
//! let transport = XhrPollingTransport::new(TransportConfig::default(), Arc::new(MyCodec));
//!
//! transport.on(EventKind::Packet, |event| {
//!     if let TransportEvent::Packet(packet) = event {
//!         println!("received {packet:?}");
//!     }
//! });
//!
//! // For every HTTP request of this connection:
//! let exchange = Exchange::builder("GET").query_string(query).build();
//! transport.bind_exchange(exchange.clone()).await?;
//! exchange.response().completed().await;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`exchange`] | Request/response pair handed in by the HTTP layer |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`listeners`] | Typed observer registry |
//! | [`protocol`] | Packet model and codec interface |
//! | [`transport`] | Carriers and the shared lifecycle |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Request/response pair handed in by the HTTP layer.
pub mod exchange;

/// Type-safe identifiers.
pub mod identifiers;

/// Typed observer registry with explicit unregistration.
pub mod listeners;

/// Packet model and codec interface.
pub mod protocol;

/// Carriers and the shared lifecycle.
///
/// See [`Transport`] for the common interface.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Exchange types
pub use exchange::{Exchange, ExchangeBuilder, HeaderMap, Method, Outcome, Response};

// Identifier types
pub use identifiers::{ExchangeId, ListenerId};

// Protocol types
pub use protocol::{Codec, DecodedPacket, Encoded, Packet, PacketData, PacketType};

// Transport types
pub use transport::{
    EventKind, JsonpPollingTransport, ReadyState, Transport, TransportConfig, TransportError,
    TransportEvent, TungsteniteSocket, WebSocket, WebSocketTransport, XhrPollingTransport,
};
