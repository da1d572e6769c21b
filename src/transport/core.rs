//! State and event surface shared by every carrier.
//!
//! [`TransportCore`] owns the lifecycle state, the writability flags and the
//! listener registry. Carriers embed one and drive it; nothing in here knows
//! about exchanges or sockets.
//!
//! # State Machine
//!
//! ```text
//! opening ──mark_open()──► open ──close()──► closing ──on_close()──► closed
//!    │                                          ▲
//!    └──────────────close()─────────────────────┘
//! ```
//!
//! `closed` is final: [`TransportCore::on_close`] runs once, later calls are
//! no-ops.
//!
//! # Flags
//!
//! | Flag | Writers | Readers |
//! |------|---------|---------|
//! | `writable` | poll bind (true), poll pre-end (false), socket bind (true), per-frame send (false/true), close (false) | `send`, `do_close` |
//! | `should_close` | `do_close` when not writable (true), `send` (false) | poll bind, `send` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::identifiers::ListenerId;
use crate::listeners::Listeners;
use crate::protocol::{Codec, Encoded, Packet};

use super::config::TransportConfig;
use super::event::{EventKind, TransportError, TransportEvent};

// ============================================================================
// ReadyState
// ============================================================================

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// Created; handshake not completed.
    Opening,
    /// Handshake completed.
    Open,
    /// Close requested; carrier shutting down.
    Closing,
    /// Terminal.
    Closed,
}

impl ReadyState {
    /// Returns the lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TransportCore
// ============================================================================

/// Mutable lifecycle state.
#[derive(Debug)]
struct CoreState {
    ready_state: ReadyState,
    writable: bool,
    should_close: bool,
}

/// State and listeners shared by every carrier.
pub struct TransportCore {
    /// Carrier name, e.g. `"polling"`.
    name: &'static str,
    /// Construction options.
    config: TransportConfig,
    /// Wire codec.
    codec: Arc<dyn Codec>,
    /// Lifecycle state.
    state: Mutex<CoreState>,
    /// Session-layer listeners.
    listeners: Listeners<TransportEvent>,
}

// ============================================================================
// TransportCore - Constructor & Accessors
// ============================================================================

impl TransportCore {
    /// Creates the core for a carrier named `name`.
    #[must_use]
    pub(crate) fn new(name: &'static str, config: TransportConfig, codec: Arc<dyn Codec>) -> Self {
        if let Err(e) = config.validate() {
            warn!(transport = name, error = %e, "Inconsistent transport timings");
        }

        Self {
            name,
            config,
            codec,
            state: Mutex::new(CoreState {
                ready_state: ReadyState::Opening,
                writable: false,
                should_close: false,
            }),
            listeners: Listeners::new(),
        }
    }

    /// Returns the carrier name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the construction options.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns `true` if binary wire data may be produced.
    #[inline]
    #[must_use]
    pub fn supports_binary(&self) -> bool {
        self.config.supports_binary
    }

    /// Returns the codec.
    #[inline]
    #[must_use]
    pub(crate) fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    /// Returns `true` if a send can be performed right now.
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.state.lock().writable
    }

    /// Returns `true` once the terminal state was reached.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().ready_state == ReadyState::Closed
    }

    /// Returns `true` if a close is waiting for a writable channel.
    #[inline]
    #[must_use]
    pub fn should_close(&self) -> bool {
        self.state.lock().should_close
    }
}

// ============================================================================
// TransportCore - Transitions
// ============================================================================

impl TransportCore {
    /// Sets the writability flag.
    pub(crate) fn set_writable(&self, writable: bool) {
        self.state.lock().writable = writable;
    }

    /// Defers a close until the next writable channel.
    pub(crate) fn set_should_close(&self, should_close: bool) {
        self.state.lock().should_close = should_close;
    }

    /// Clears the deferred close, returning whether it was set.
    pub(crate) fn take_should_close(&self) -> bool {
        std::mem::take(&mut self.state.lock().should_close)
    }

    /// Moves `opening` to `open`. Returns `false` from any other state.
    pub(crate) fn mark_open(&self) -> bool {
        let mut state = self.state.lock();
        if state.ready_state != ReadyState::Opening {
            return false;
        }
        state.ready_state = ReadyState::Open;
        debug!(transport = self.name, "Transport open");
        true
    }

    /// Enters `closing`. Returns `false` if already `closed`.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if state.ready_state == ReadyState::Closed {
            return false;
        }
        state.ready_state = ReadyState::Closing;
        true
    }
}

// ============================================================================
// TransportCore - Events
// ============================================================================

impl TransportCore {
    /// Registers a session-layer listener.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.listeners.add(kind, handler)
    }

    /// Unregisters a listener. Returns `false` if it was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Returns `true` if anything listens for `kind`.
    #[must_use]
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners.has(kind)
    }

    /// Emits a decoded inbound packet.
    pub(crate) fn on_packet(&self, packet: Packet) {
        trace!(transport = self.name, packet_type = %packet.packet_type, "Packet received");
        self.listeners.emit(&TransportEvent::Packet(packet));
    }

    /// Decodes one wire packet and emits it.
    pub(crate) fn on_data(&self, data: Encoded) {
        match self.codec.decode_packet(data) {
            Ok(packet) => self.on_packet(packet),
            Err(e) => self.on_error(e.to_string()),
        }
    }

    /// Reports a recoverable failure.
    ///
    /// Without an `error` listener the failure is only logged.
    pub(crate) fn on_error(&self, description: impl Into<String>) {
        let description = description.into();

        if self.listeners.has(EventKind::Error) {
            self.listeners
                .emit(&TransportEvent::Error(TransportError::new(description)));
        } else {
            debug!(
                transport = self.name,
                state = %self.ready_state(),
                error = %description,
                "Ignored transport error"
            );
        }
    }

    /// Signals that a writable channel became available.
    pub(crate) fn emit_drain(&self) {
        self.listeners.emit(&TransportEvent::Drain);
    }

    /// Enters `closed` and emits `close`.
    ///
    /// Returns `false` (and emits nothing) if already closed.
    pub(crate) fn on_close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.ready_state == ReadyState::Closed {
                return false;
            }
            state.ready_state = ReadyState::Closed;
            state.writable = false;
        }

        debug!(transport = self.name, "Transport closed");
        self.listeners.emit(&TransportEvent::Close);
        true
    }
}

impl fmt::Debug for TransportCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TransportCore")
            .field("name", &self.name)
            .field("ready_state", &state.ready_state)
            .field("writable", &state.writable)
            .field("should_close", &state.should_close)
            .field("supports_binary", &self.config.supports_binary)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
