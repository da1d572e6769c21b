//! WebSocket carrier.
//!
//! One upgrade exchange is bound for the life of the transport. A single
//! background task reads frames; `send` writes one frame per packet.
//!
//! # Receive Loop
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ receive() ──► Ok(Some(frame)) ──► on_data    │
//! │     ▲     ──► Err(e)          ──► on_error ──┤
//! │     └────────────────────────────────────────┘
//! │           ──► Ok(None)        ──► close()    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Read errors never stop the loop; only end of stream does. The loop holds
//! a weak reference so dropping the transport ends it too.

// ============================================================================
// Submodules
// ============================================================================

/// Socket seam and tungstenite adapter.
pub mod socket;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::identifiers::{ExchangeId, ListenerId};
use crate::protocol::{Codec, Packet};

use super::Transport;
use super::config::TransportConfig;
use super::core::{ReadyState, TransportCore};

// ============================================================================
// Re-exports
// ============================================================================

pub use socket::{TungsteniteSocket, WebSocket};

// ============================================================================
// Constants
// ============================================================================

/// Carrier name.
pub const WEBSOCKET: &str = "websocket";

// ============================================================================
// Types
// ============================================================================

/// Socket binding and reader task.
#[derive(Default)]
struct SocketState {
    socket: Option<Arc<dyn WebSocket>>,
    exchange: Option<Exchange>,
    release_hook: Option<ListenerId>,
    reader: Option<JoinHandle<()>>,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket carrier.
pub struct WebSocketTransport {
    /// Shared lifecycle state.
    core: TransportCore,
    /// Bound socket, exchange and reader.
    state: Mutex<SocketState>,
    /// Serializes batches so frames of two sends never interleave.
    send_lock: tokio::sync::Mutex<()>,
    /// Self reference for the reader task and response hooks.
    weak: Weak<Self>,
}

impl WebSocketTransport {
    /// Creates an unbound WebSocket transport.
    #[must_use]
    pub fn new(config: TransportConfig, codec: Arc<dyn Codec>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            core: TransportCore::new(WEBSOCKET, config, codec),
            state: Mutex::new(SocketState::default()),
            send_lock: tokio::sync::Mutex::new(()),
            weak: weak.clone(),
        })
    }

    /// Returns `true` while the receive loop is running.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.state
            .lock()
            .reader
            .as_ref()
            .is_some_and(|reader| !reader.is_finished())
    }

    /// Returns `true` while the upgrade exchange is bound.
    #[must_use]
    pub fn has_exchange(&self) -> bool {
        self.state.lock().exchange.is_some()
    }
}

// ============================================================================
// WebSocketTransport - Binding
// ============================================================================

impl WebSocketTransport {
    /// Binds the upgrade exchange and starts the receive loop.
    ///
    /// # Errors
    ///
    /// - [`Error::UpgradeMissing`] if the exchange carries no socket; it is
    ///   answered with 500
    /// - [`Error::Protocol`] if a socket is already bound or the transport
    ///   is closed; the new exchange is answered with 500
    pub fn bind(&self, exchange: Exchange) -> Result<()> {
        if self.core.is_closed() {
            debug!(transport = WEBSOCKET, exchange = %exchange.id(), "Upgrade after close");
            reject(&exchange, "");
            return Err(Error::protocol("transport closed"));
        }

        let bound = self.state.lock().exchange.as_ref().map(Exchange::id);

        if let Some(bound) = bound {
            if bound == exchange.id() {
                trace!(transport = WEBSOCKET, exchange = %bound, "Upgrade already bound");
                return Ok(());
            }

            warn!(transport = WEBSOCKET, bound = %bound, exchange = %exchange.id(), "Second upgrade");
            reject(&exchange, "");
            return Err(Error::protocol("websocket already bound"));
        }

        let Some(socket) = exchange.take_websocket() else {
            warn!(transport = WEBSOCKET, exchange = %exchange.id(), "Exchange has no upgraded socket");
            reject(&exchange, "not able to create websocket");
            return Err(Error::upgrade_missing(exchange.id()));
        };

        let id = exchange.id();
        let weak = self.weak.clone();
        let release_hook = exchange.response().on_post_end(move || {
            if let Some(transport) = weak.upgrade() {
                transport.release_exchange(id);
            }
        });

        {
            let mut state = self.state.lock();
            state.socket = Some(Arc::clone(&socket));
            state.exchange = Some(exchange);
            state.release_hook = Some(release_hook);
        }
        self.core.set_writable(true);

        let reader = tokio::spawn(Self::read_loop(self.weak.clone(), socket));
        self.state.lock().reader = Some(reader);

        debug!(transport = WEBSOCKET, exchange = %id, "Socket bound");
        Ok(())
    }

    async fn read_loop(weak: Weak<Self>, socket: Arc<dyn WebSocket>) {
        loop {
            let received = socket.receive().await;
            let Some(transport) = weak.upgrade() else {
                trace!(transport = WEBSOCKET, "Transport dropped, stopping reader");
                return;
            };

            match received {
                Ok(Some(data)) => {
                    trace!(transport = WEBSOCKET, len = data.len(), "Frame received");
                    transport.core.on_data(data);
                }
                Ok(None) => break,
                Err(e) => transport.core.on_error(e.to_string()),
            }
        }

        if let Some(transport) = weak.upgrade() {
            transport.on_stream_end().await;
        }
    }

    /// Closes the transport from the reader task itself.
    async fn on_stream_end(&self) {
        // Detach so do_close does not abort the task running this.
        drop(self.state.lock().reader.take());
        debug!(transport = WEBSOCKET, "Socket stream ended");
        self.shutdown("stream end").await;
    }

    fn release_exchange(&self, id: ExchangeId) {
        let released = {
            let mut state = self.state.lock();
            if state.exchange.as_ref().map(Exchange::id) != Some(id) {
                return;
            }
            state.exchange.take().zip(state.release_hook.take())
        };

        if let Some((exchange, hook)) = released {
            exchange.response().remove_listener(hook);
            trace!(transport = WEBSOCKET, exchange = %id, "Upgrade exchange released");
        }
    }
}

// ============================================================================
// WebSocketTransport - Sending
// ============================================================================

impl WebSocketTransport {
    /// Writes each packet as its own frame, in order.
    ///
    /// A failed frame is reported as an `error` event and the remaining
    /// packets are still sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotWritable`] if no socket is bound or the transport
    /// was closed.
    pub async fn send_frames(&self, packets: Vec<Packet>) -> Result<()> {
        if self.core.is_closed() {
            return Err(Error::not_writable(WEBSOCKET));
        }

        let socket = self
            .state
            .lock()
            .socket
            .clone()
            .ok_or_else(|| Error::not_writable(WEBSOCKET))?;

        let _guard = self.send_lock.lock().await;

        for packet in packets {
            let data = self
                .core
                .codec()
                .encode_packet(&packet, self.core.supports_binary());

            self.core.set_writable(false);
            if let Err(e) = socket.send(data).await {
                debug!(transport = WEBSOCKET, error = %e, packet_type = %packet.packet_type, "Frame send failed");
                self.core.on_error(e.to_string());
            }
            if self.core.ready_state() != ReadyState::Closed {
                self.core.set_writable(true);
            }
        }

        Ok(())
    }
}

// ============================================================================
// WebSocketTransport - Closing
// ============================================================================

impl WebSocketTransport {
    /// Closes the transport. No-op once closed.
    ///
    /// Stops the reader, closes the socket and answers the upgrade exchange
    /// with 200 if it is still pending.
    pub async fn shutdown(&self, reason: &str) {
        if !self.core.begin_close() {
            trace!(transport = WEBSOCKET, "Already closed");
            return;
        }

        debug!(transport = WEBSOCKET, reason, "Closing");
        self.do_close().await;

        let exchange = self.state.lock().exchange.clone();
        if let Some(exchange) = exchange
            && let Err(e) = exchange.response().end(200, "closed")
        {
            debug!(error = %e, "Upgrade exchange already finalized");
        }
    }

    async fn do_close(&self) {
        let (reader, socket) = {
            let mut state = self.state.lock();
            (state.reader.take(), state.socket.take())
        };

        if let Some(reader) = reader {
            reader.abort();
        }

        if let Some(socket) = socket
            && let Err(e) = socket.close().await
        {
            debug!(transport = WEBSOCKET, error = %e, "Socket close failed");
        }

        self.core.on_close();
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for WebSocketTransport {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    async fn bind_exchange(&self, exchange: Exchange) -> Result<()> {
        self.bind(exchange)
    }

    async fn send(&self, packets: Vec<Packet>) -> Result<()> {
        self.send_frames(packets).await
    }

    async fn close(&self, reason: &str) {
        self.shutdown(reason).await;
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.state.get_mut().reader.take() {
            reader.abort();
        }
    }
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WebSocketTransport")
            .field("core", &self.core)
            .field("exchange", &state.exchange.as_ref().map(Exchange::id))
            .field("reading", &state.reader.is_some())
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Answers an exchange that cannot be bound with 500.
fn reject(exchange: &Exchange, body: &str) {
    if let Err(e) = exchange.response().end(500, body) {
        debug!(error = %e, "Rejected exchange already finalized");
    }
}

// ============================================================================
// Tests
// ============================================================================
