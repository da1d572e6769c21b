//! Carriers behind one packet-oriented interface.
//!
//! A transport is created once per connection and survives every exchange
//! bound to it. The HTTP layer binds exchanges; the session layer listens
//! for events and calls `send`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  bind_exchange   ┌─────────────────────┐   events    ┌───────────────┐
//! │  HTTP layer  │─────────────────►│      Transport      │────────────►│ Session layer │
//! │ (dispatcher) │                  │  ┌───────────────┐  │◄────────────│               │
//! └──────────────┘                  │  │ TransportCore │  │    send     └───────────────┘
//!                                   │  └───────────────┘  │
//!                                   │   polling | ws      │──► Codec
//!                                   └─────────────────────┘
//! ```
//!
//! # Carriers
//!
//! | Carrier | Exchanges | Background task |
//! |---------|-----------|-----------------|
//! | [`XhrPollingTransport`] | GET poll + POST data, plain body | none |
//! | [`JsonpPollingTransport`] | GET poll + POST data, script callback | none |
//! | [`WebSocketTransport`] | one upgrade exchange | one receive loop |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | Construction options |
//! | `core` | Shared lifecycle state and listeners |
//! | `cors` | Cross-origin header merge |
//! | `event` | Session-layer events |
//! | `polling` | Long-polling carriers |
//! | `websocket` | WebSocket carrier and socket seam |

// ============================================================================
// Submodules
// ============================================================================

/// Construction options.
pub mod config;

/// Shared lifecycle state and listeners.
pub mod core;

/// Cross-origin header merge.
pub mod cors;

/// Session-layer events.
pub mod event;

/// Long-polling carriers.
pub mod polling;

/// WebSocket carrier.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::exchange::Exchange;
use crate::identifiers::ListenerId;
use crate::protocol::Packet;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::config::TransportConfig;
pub use self::core::{ReadyState, TransportCore};
pub use self::event::{EventKind, TransportError, TransportEvent};
pub use self::polling::{
    Jsonp, JsonpPollingTransport, PollingFormat, PollingTransport, Xhr, XhrPollingTransport,
};
pub use self::websocket::{TungsteniteSocket, WebSocket, WebSocketTransport};

// ============================================================================
// Transport
// ============================================================================

/// A carrier for one logical connection.
///
/// # Example
///
/// ```ignore
/// let transport = XhrPollingTransport::new(TransportConfig::default(), codec);
/// transport.on(EventKind::Packet, |event| println!("{event:?}"));
///
/// // For every inbound HTTP request of this connection:
/// transport.bind_exchange(exchange).await?;
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Returns the shared state.
    fn core(&self) -> &TransportCore;

    /// Associates an inbound exchange with this transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpgradeMissing`](crate::Error::UpgradeMissing) when a
    /// WebSocket transport is handed an exchange without a socket.
    async fn bind_exchange(&self, exchange: Exchange) -> Result<()>;

    /// Sends packets to the client, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotWritable`](crate::Error::NotWritable) when no
    /// channel is bound to carry the data.
    async fn send(&self, packets: Vec<Packet>) -> Result<()>;

    /// Initiates shutdown. A second call on a closed transport is a no-op.
    async fn close(&self, reason: &str);

    /// Returns the carrier name.
    fn name(&self) -> &'static str {
        self.core().name()
    }

    /// Returns the lifecycle state.
    fn ready_state(&self) -> ReadyState {
        self.core().ready_state()
    }

    /// Returns `true` if a send can be performed right now.
    fn is_writable(&self) -> bool {
        self.core().is_writable()
    }

    /// Returns `true` if binary wire data may be produced.
    fn supports_binary(&self) -> bool {
        self.core().supports_binary()
    }

    /// Completes the handshake transition `opening → open`.
    ///
    /// Returns `false` if the transport was not `opening`.
    fn mark_open(&self) -> bool {
        self.core().mark_open()
    }

    /// Registers a session-layer listener.
    fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        Self: Sized,
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.core().on(kind, handler)
    }

    /// Unregisters a listener. Returns `false` if it was already removed.
    fn remove_listener(&self, id: ListenerId) -> bool {
        self.core().remove_listener(id)
    }
}
