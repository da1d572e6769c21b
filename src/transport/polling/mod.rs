//! Long-polling carriers.
//!
//! Two exchange roles are tracked independently:
//!
//! | Role | Method | Purpose | Outstanding |
//! |------|--------|---------|-------------|
//! | poll | `GET` | server → client payloads | at most one |
//! | data | `POST` | client → server payloads | at most one |
//!
//! All work happens synchronously inside the call that delivered the
//! exchange; there is no background task.
//!
//! # Poll Binding
//!
//! 1. A second poll while one is bound is answered with 500 and reported as
//!    an `error`; the bound poll stays untouched.
//! 2. The poll is bound with a post-end hook (release) and a pre-end hook
//!    (`writable = false`).
//! 3. `writable = true`, `drain` is emitted so buffered packets flush.
//! 4. A deferred close is flushed with a `noop` so the `close` packet rides
//!    on this response.
//!
//! The two wire formats differ only in framing, see [`PollingFormat`].

// ============================================================================
// Submodules
// ============================================================================

/// Script-injection framing.
pub mod jsonp;

/// Plain body framing.
pub mod xhr;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::exchange::{BINARY_CONTENT_TYPE, Exchange, HeaderMap, Method};
use crate::identifiers::{ExchangeId, ListenerId};
use crate::protocol::{Codec, Encoded, Packet};

use super::Transport;
use super::config::TransportConfig;
use super::core::TransportCore;
use super::cors;

// ============================================================================
// Re-exports
// ============================================================================

pub use jsonp::Jsonp;
pub use xhr::Xhr;

// ============================================================================
// Constants
// ============================================================================

/// Carrier name shared by both long-polling formats.
pub const POLLING: &str = "polling";

/// Content type of text payloads.
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

/// Acknowledgement body of a data exchange.
const DATA_ACK: &str = "ok";

// ============================================================================
// Types
// ============================================================================

/// Plain long-polling.
pub type XhrPollingTransport = PollingTransport<Xhr>;

/// Script-injection long-polling.
pub type JsonpPollingTransport = PollingTransport<Jsonp>;

// ============================================================================
// PollingFormat
// ============================================================================

/// Wire framing of a long-polling variant.
pub trait PollingFormat: Send + Sync + 'static {
    /// Returns `true` if the variant can only carry text.
    fn forces_text(&self) -> bool {
        false
    }

    /// Returns `true` if `OPTIONS` preflights are answered.
    fn answers_preflight(&self) -> bool {
        false
    }

    /// Extracts the encoded payload from a data exchange body.
    ///
    /// `Ok(None)` drops the body without reporting an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the body cannot be read.
    fn decode_body(&self, exchange: &Exchange) -> Result<Option<Encoded>>;

    /// Frames an encoded payload for the poll response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPayload`] for data the framing cannot carry.
    fn frame(&self, exchange: &Exchange, payload: Encoded) -> Result<Encoded>;
}

// ============================================================================
// Binding
// ============================================================================

/// An exchange bound to one role, with the hooks registered on it.
struct Binding {
    exchange: Exchange,
    hooks: Vec<ListenerId>,
}

impl Binding {
    /// Unregisters every hook this binding registered.
    fn release(self) {
        let response = self.exchange.response();
        for id in self.hooks {
            response.remove_listener(id);
        }
    }
}

/// Bound exchanges by role.
#[derive(Default)]
struct PollingState {
    poll: Option<Binding>,
    data: Option<Binding>,
}

// ============================================================================
// PollingTransport
// ============================================================================

/// Long-polling carrier, generic over its wire framing.
pub struct PollingTransport<F: PollingFormat> {
    /// Shared lifecycle state.
    core: TransportCore,
    /// Wire framing.
    format: F,
    /// Bound exchanges.
    state: Mutex<PollingState>,
    /// Self reference captured by response hooks.
    weak: Weak<Self>,
}

// ============================================================================
// PollingTransport - Constructors
// ============================================================================

impl<F: PollingFormat> PollingTransport<F> {
    /// Creates a transport using `format`.
    ///
    /// Text-only formats override `supports_binary` to `false`.
    #[must_use]
    pub fn with_format(format: F, config: TransportConfig, codec: Arc<dyn Codec>) -> Arc<Self> {
        let config = if format.forces_text() && config.supports_binary {
            debug!(transport = POLLING, "Binary disabled for text-only framing");
            config.with_supports_binary(false)
        } else {
            config
        };

        Arc::new_cyclic(|weak| Self {
            core: TransportCore::new(POLLING, config, codec),
            format,
            state: Mutex::new(PollingState::default()),
            weak: weak.clone(),
        })
    }

    /// Returns the framing.
    #[inline]
    #[must_use]
    pub fn format(&self) -> &F {
        &self.format
    }

    /// Returns `true` while a poll exchange is bound.
    #[must_use]
    pub fn has_poll(&self) -> bool {
        self.state.lock().poll.is_some()
    }

    /// Returns `true` while a data exchange is bound.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Returns the id of the bound poll exchange.
    #[must_use]
    pub fn poll_id(&self) -> Option<ExchangeId> {
        self.state.lock().poll.as_ref().map(|b| b.exchange.id())
    }

    /// Returns a handle to the bound poll exchange.
    fn poll_exchange(&self) -> Option<Exchange> {
        self.state.lock().poll.as_ref().map(|b| b.exchange.clone())
    }
}

// ============================================================================
// PollingTransport - Exchange Handling
// ============================================================================

impl<F: PollingFormat> PollingTransport<F> {
    /// Routes an exchange by method.
    ///
    /// `GET` binds a poll, `POST` delivers data, `OPTIONS` is answered when
    /// the framing supports preflights, anything else is ignored.
    pub fn handle_exchange(&self, exchange: Exchange) {
        match exchange.method() {
            Method::Get => self.on_poll_request(exchange),
            Method::Post => self.on_data_request(exchange),
            Method::Options if self.format.answers_preflight() => self.on_preflight(exchange),
            other => trace!(transport = POLLING, method = %other, "Ignoring exchange"),
        }
    }

    fn on_poll_request(&self, exchange: Exchange) {
        if self.reject_if_closed(&exchange) {
            return;
        }

        let bound = self.poll_id();

        if let Some(bound) = bound {
            if bound == exchange.id() {
                trace!(transport = POLLING, exchange = %bound, "Poll already bound");
                return;
            }

            warn!(
                transport = POLLING,
                state = %self.core.ready_state(),
                bound = %bound,
                exchange = %exchange.id(),
                "Request overlap"
            );
            self.core.on_error("overlap from client");
            if let Err(e) = exchange.response().end(500, "") {
                debug!(error = %e, "Overlapping poll already finalized");
            }
            return;
        }

        debug!(
            transport = POLLING,
            state = %self.core.ready_state(),
            exchange = %exchange.id(),
            "Setting poll request"
        );

        let id = exchange.id();
        let response = exchange.response();

        let weak = self.weak.clone();
        let release = response.on_post_end(move || {
            if let Some(transport) = weak.upgrade() {
                transport.release_poll(id);
            }
        });

        let weak = self.weak.clone();
        let close_window = response.on_pre_end(move || {
            if let Some(transport) = weak.upgrade() {
                transport.core.set_writable(false);
            }
        });

        self.state.lock().poll = Some(Binding {
            exchange,
            hooks: vec![release, close_window],
        });

        self.core.set_writable(true);
        self.core.emit_drain();

        if self.core.should_close() && self.core.is_writable() {
            debug!(transport = POLLING, "Triggering empty send to append close packet");
            if let Err(e) = self.send_packets(vec![Packet::noop()]) {
                debug!(error = %e, "Deferred close flush failed");
            }
        }
    }

    fn on_data_request(&self, exchange: Exchange) {
        if self.reject_if_closed(&exchange) {
            return;
        }

        let id = exchange.id();

        let weak = self.weak.clone();
        let release = exchange.response().on_post_end(move || {
            if let Some(transport) = weak.upgrade() {
                transport.release_data(id);
            }
        });

        let previous = self.state.lock().data.replace(Binding {
            exchange: exchange.clone(),
            hooks: vec![release],
        });
        if let Some(previous) = previous {
            debug!(transport = POLLING, stale = %previous.exchange.id(), "Replacing data request");
            previous.release();
        }

        match self.format.decode_body(&exchange) {
            Ok(Some(payload)) => self.on_data(payload),
            Ok(None) => debug!(transport = POLLING, "Dropping unsupported data payload"),
            Err(e) => self.core.on_error(e.to_string()),
        }

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "text/html");
        headers.insert("Content-Length", DATA_ACK.len().to_string());
        cors::merge_cors(&exchange, &mut headers);

        let response = exchange.response();
        response.merge_headers(&headers);
        if let Err(e) = response.end(200, DATA_ACK) {
            debug!(error = %e, "Data request already finalized");
        }
    }

    /// Answers `exchange` with 500 if the transport is closed.
    ///
    /// Nothing is bound and no event fires.
    fn reject_if_closed(&self, exchange: &Exchange) -> bool {
        if !self.core.is_closed() {
            return false;
        }

        debug!(transport = POLLING, exchange = %exchange.id(), "Exchange after close");
        if let Err(e) = exchange.response().end(500, "") {
            debug!(error = %e, "Late exchange already finalized");
        }
        true
    }

    fn on_preflight(&self, exchange: Exchange) {
        let response = exchange.response();
        response.merge_headers(&cors::preflight_headers(&exchange));
        if let Err(e) = response.end(200, "") {
            debug!(error = %e, "Preflight already finalized");
        }
    }

    /// Decodes a payload and routes its packets in order.
    ///
    /// A `close` packet closes the transport; packets after it are dropped.
    fn on_data(&self, payload: Encoded) {
        trace!(transport = POLLING, len = payload.len(), "Received payload");

        let packets = match self.core.codec().decode_payload(payload) {
            Ok(packets) => packets,
            Err(e) => {
                self.core.on_error(e.to_string());
                return;
            }
        };

        for decoded in packets {
            if decoded.packet.is_close() {
                debug!(
                    transport = POLLING,
                    index = decoded.index,
                    total = decoded.total,
                    "Got close packet"
                );
                self.shutdown("client close");
                break;
            }
            self.core.on_packet(decoded.packet);
        }
    }

    fn release_poll(&self, id: ExchangeId) {
        let binding = {
            let mut state = self.state.lock();
            match &state.poll {
                Some(binding) if binding.exchange.id() == id => state.poll.take(),
                _ => None,
            }
        };

        if let Some(binding) = binding {
            trace!(transport = POLLING, exchange = %id, "Poll released");
            binding.release();
        }
    }

    fn release_data(&self, id: ExchangeId) {
        let binding = {
            let mut state = self.state.lock();
            match &state.data {
                Some(binding) if binding.exchange.id() == id => state.data.take(),
                _ => None,
            }
        };

        if let Some(binding) = binding {
            trace!(transport = POLLING, exchange = %id, "Data request released");
            binding.release();
        }
    }
}

// ============================================================================
// PollingTransport - Sending
// ============================================================================

impl<F: PollingFormat> PollingTransport<F> {
    /// Encodes `packets` as one payload and answers the bound poll.
    ///
    /// A deferred close appends a `close` packet and closes the transport
    /// once written. Safe to call from a `drain` listener.
    ///
    /// # Errors
    ///
    /// - [`Error::NotWritable`] if no poll is bound
    /// - [`Error::UnsupportedPayload`] if the framing rejects the payload
    pub fn send_packets(&self, mut packets: Vec<Packet>) -> Result<()> {
        let exchange = self
            .poll_exchange()
            .filter(|exchange| !exchange.response().is_set())
            .ok_or_else(|| Error::not_writable(POLLING))?;

        let closing = self.core.take_should_close();
        if closing {
            packets.push(Packet::close());
        }

        let payload = self
            .core
            .codec()
            .encode_payload(&packets, self.core.supports_binary());

        if let Err(e) = self.write(&exchange, payload) {
            if closing {
                self.core.set_should_close(true);
            }
            return Err(e);
        }

        if closing {
            self.core.on_close();
        }
        Ok(())
    }

    /// Frames `payload`, sets headers and finalizes the poll response.
    fn write(&self, exchange: &Exchange, payload: Encoded) -> Result<()> {
        let framed = self.format.frame(exchange, payload)?;
        let content_type = if framed.is_binary() {
            BINARY_CONTENT_TYPE
        } else {
            TEXT_CONTENT_TYPE
        };
        let body = framed.into_bytes();

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", content_type);
        headers.insert("Content-Length", body.len().to_string());
        if exchange.header("user-agent").is_some_and(is_legacy_ie) {
            headers.insert("X-XSS-Protection", "0");
        }
        cors::merge_cors(exchange, &mut headers);

        trace!(transport = POLLING, len = body.len(), content_type, "Writing payload");

        let response = exchange.response();
        response.merge_headers(&headers);
        response.end(200, &body)
    }
}

// ============================================================================
// PollingTransport - Closing
// ============================================================================

impl<F: PollingFormat> PollingTransport<F> {
    /// Closes the transport.
    ///
    /// With a bound poll the `close` packet rides on it immediately;
    /// otherwise it is deferred to the next poll. No-op once closed.
    pub fn shutdown(&self, reason: &str) {
        if !self.core.begin_close() {
            trace!(transport = POLLING, "Already closed");
            return;
        }

        debug!(transport = POLLING, reason, writable = self.core.is_writable(), "Closing");
        self.do_close();

        if let Some(exchange) = self.poll_exchange() {
            let response = exchange.response();
            if !response.is_set()
                && let Err(e) = response.end(200, "closed")
            {
                debug!(error = %e, "Poll already finalized");
            }
        }
    }

    fn do_close(&self) {
        let data = self
            .state
            .lock()
            .data
            .as_ref()
            .map(|binding| binding.exchange.clone());
        if let Some(data) = data {
            debug!(transport = POLLING, exchange = %data.id(), "Aborting ongoing data request");
            data.response().abort();
        }

        if self.core.is_writable() {
            match self.send_packets(vec![Packet::close()]) {
                Ok(()) => {
                    self.core.on_close();
                }
                Err(e) => {
                    debug!(error = %e, "Close packet not delivered - deferring to next poll");
                    self.core.set_should_close(true);
                }
            }
        } else {
            debug!(transport = POLLING, "Transport not writable - buffering orderly close");
            self.core.set_should_close(true);
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl<F: PollingFormat> Transport for PollingTransport<F> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    async fn bind_exchange(&self, exchange: Exchange) -> Result<()> {
        self.handle_exchange(exchange);
        Ok(())
    }

    async fn send(&self, packets: Vec<Packet>) -> Result<()> {
        self.send_packets(packets)
    }

    async fn close(&self, reason: &str) {
        self.shutdown(reason);
    }
}

impl<F: PollingFormat> fmt::Debug for PollingTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PollingTransport")
            .field("core", &self.core)
            .field("poll", &state.poll.as_ref().map(|b| b.exchange.id()))
            .field("data", &state.data.as_ref().map(|b| b.exchange.id()))
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns `true` for Internet Explorer user agents.
fn is_legacy_ie(user_agent: &str) -> bool {
    user_agent.contains(";MSIE") || user_agent.contains("Trident/")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::exchange::Outcome;
    use crate::protocol::{PacketData, PacketType};
    use crate::testing::{Recorder, TestCodec, init_tracing};
    use crate::transport::{EventKind, ReadyState};

    fn transport() -> Arc<XhrPollingTransport> {
        init_tracing();
        XhrPollingTransport::new(TransportConfig::text_only(), Arc::new(TestCodec))
    }

    fn poll() -> Exchange {
        Exchange::builder("GET").build()
    }

    fn data(body: &str) -> Exchange {
        Exchange::builder("POST").body(body.to_owned()).build()
    }

    fn decode_response(exchange: &Exchange) -> Vec<Packet> {
        let body = String::from_utf8(exchange.response().body().to_vec()).expect("text body");
        TestCodec
            .decode_payload(Encoded::Text(body))
            .expect("decodable payload")
            .into_iter()
            .map(|decoded| decoded.packet)
            .collect()
    }

    #[test]
    fn test_data_request_emits_packet_and_acks() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        let exchange = data(&TestCodec.payload(&[Packet::message("hi")]));

        transport.handle_exchange(exchange.clone());

        assert_eq!(recorder.packets(), vec![Packet::message("hi")]);
        let response = exchange.response();
        assert_eq!(response.outcome(), Outcome::Ended);
        assert_eq!(response.status(), 200);
        assert_eq!(&response.body()[..], b"ok");
        assert_eq!(response.headers().get("Content-Type"), Some("text/html"));
        assert_eq!(response.headers().get("Content-Length"), Some("2"));
        assert!(!transport.has_data());
        assert_eq!(response.hook_count(), 0);
    }

    #[test]
    fn test_poll_sets_writable_and_drains() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());

        transport.handle_exchange(poll());

        assert!(transport.core().is_writable());
        assert!(transport.has_poll());
        assert_eq!(recorder.count(EventKind::Drain), 1);
    }

    #[test]
    fn test_send_answers_poll_in_order() {
        let transport = transport();
        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        let packets = vec![Packet::message("a"), Packet::message("b"), Packet::noop()];
        transport.send_packets(packets.clone()).expect("send");

        assert_eq!(decode_response(&exchange), packets);
        assert!(!transport.core().is_writable());
        assert!(!transport.has_poll());
        assert_eq!(exchange.response().hook_count(), 0);

        let headers = exchange.response().headers();
        assert_eq!(headers.get("Content-Type"), Some("text/plain; charset=UTF-8"));
        assert_eq!(
            headers.get("Content-Length"),
            Some(exchange.response().body().len().to_string().as_str())
        );
        assert_eq!(headers.get("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn test_send_without_poll_is_rejected() {
        let transport = transport();
        let err = transport.send_packets(vec![Packet::message("x")]).unwrap_err();
        assert!(matches!(err, Error::NotWritable { .. }));
    }

    #[test]
    fn test_overlapping_poll_gets_500() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        let first = poll();
        let second = poll();

        transport.handle_exchange(first.clone());
        transport.handle_exchange(second.clone());

        assert_eq!(second.response().status(), 500);
        assert_eq!(second.response().outcome(), Outcome::Ended);
        assert!(!first.response().is_set());
        assert_eq!(transport.poll_id(), Some(first.id()));
        assert!(transport.core().is_writable());
        assert_eq!(recorder.errors().len(), 1);
        assert_eq!(recorder.errors()[0].description, "overlap from client");
    }

    #[test]
    fn test_rebinding_same_poll_is_noop() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        let exchange = poll();

        transport.handle_exchange(exchange.clone());
        transport.handle_exchange(exchange.clone());

        assert!(!exchange.response().is_set());
        assert_eq!(recorder.count(EventKind::Drain), 1);
        assert_eq!(recorder.count(EventKind::Error), 0);
    }

    #[test]
    fn test_other_methods_are_ignored() {
        let transport = transport();
        let exchange = Exchange::builder("PUT").build();

        transport.handle_exchange(exchange.clone());

        assert!(!exchange.response().is_set());
        assert!(!transport.has_poll());
        assert!(!transport.has_data());
    }

    #[test]
    fn test_preflight_answered() {
        let transport = transport();
        let exchange = Exchange::builder("OPTIONS")
            .header("Origin", "https://app.example")
            .build();

        transport.handle_exchange(exchange.clone());

        let headers = exchange.response().headers();
        assert_eq!(exchange.response().status(), 200);
        assert!(exchange.response().is_set());
        assert_eq!(headers.get("Access-Control-Allow-Headers"), Some("Content-Type"));
        assert_eq!(
            headers.get("Access-Control-Allow-Origin"),
            Some("https://app.example")
        );
    }

    #[test]
    fn test_close_while_not_writable_is_deferred() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());

        transport.shutdown("server close");
        assert_eq!(transport.core().ready_state(), ReadyState::Closing);
        assert!(transport.core().should_close());
        assert_eq!(recorder.count(EventKind::Close), 0);

        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        assert!(!transport.core().should_close());
        let delivered = decode_response(&exchange);
        assert_eq!(delivered.last(), Some(&Packet::close()));
        assert_eq!(transport.core().ready_state(), ReadyState::Closed);
        assert_eq!(recorder.count(EventKind::Close), 1);
    }

    #[test]
    fn test_close_while_writable_rides_on_poll() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        transport.shutdown("server close");

        assert_eq!(decode_response(&exchange), vec![Packet::close()]);
        assert_eq!(transport.core().ready_state(), ReadyState::Closed);
        assert_eq!(recorder.count(EventKind::Close), 1);

        transport.shutdown("again");
        assert_eq!(recorder.count(EventKind::Close), 1);
    }

    /// Framing that refuses every payload.
    struct RefusingFormat;

    impl PollingFormat for RefusingFormat {
        fn decode_body(&self, exchange: &Exchange) -> Result<Option<Encoded>> {
            Ok(Some(Encoded::Binary(exchange.body().clone())))
        }

        fn frame(&self, _exchange: &Exchange, _payload: Encoded) -> Result<Encoded> {
            Err(Error::unsupported_payload(POLLING, "refused"))
        }
    }

    #[test]
    fn test_close_kept_when_flush_fails() {
        init_tracing();
        let transport = PollingTransport::with_format(
            RefusingFormat,
            TransportConfig::text_only(),
            Arc::new(TestCodec),
        );
        let recorder = Recorder::attach(transport.core());
        transport.handle_exchange(poll());
        assert!(transport.core().is_writable());

        transport.shutdown("server close");

        assert_eq!(transport.core().ready_state(), ReadyState::Closing);
        assert!(transport.core().should_close());
        assert_eq!(recorder.count(EventKind::Close), 0);
    }

    #[test]
    fn test_closed_transport_rejects_poll() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        transport.handle_exchange(poll());
        transport.shutdown("server close");
        assert_eq!(transport.core().ready_state(), ReadyState::Closed);
        let drains = recorder.count(EventKind::Drain);

        let late = poll();
        transport.handle_exchange(late.clone());

        assert_eq!(late.response().status(), 500);
        assert!(!transport.core().is_writable());
        assert!(!transport.has_poll());
        assert_eq!(recorder.count(EventKind::Drain), drains);
        assert!(recorder.errors().is_empty());
    }

    #[test]
    fn test_closed_transport_rejects_data() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        transport.handle_exchange(poll());
        transport.shutdown("server close");

        let late = data(&TestCodec.payload(&[Packet::message("late")]));
        transport.handle_exchange(late.clone());

        assert_eq!(late.response().status(), 500);
        assert!(recorder.packets().is_empty());
        assert!(!transport.has_data());
    }

    #[test]
    fn test_close_packet_halts_payload() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        let payload = TestCodec.payload(&[
            Packet::message("before"),
            Packet::close(),
            Packet::message("after"),
        ]);

        let exchange = data(&payload);
        transport.handle_exchange(exchange.clone());

        assert_eq!(recorder.packets(), vec![Packet::message("before")]);
        assert_eq!(transport.core().ready_state(), ReadyState::Closing);
        assert!(transport.core().should_close());
        assert_eq!(exchange.response().outcome(), Outcome::Aborted);
        assert!(!transport.has_data());
    }

    #[test]
    fn test_drain_listener_flushes_buffer() {
        let transport = transport();
        let weak = Arc::downgrade(&transport);
        transport.core().on(EventKind::Drain, move |_| {
            if let Some(transport) = weak.upgrade() {
                transport
                    .send_packets(vec![Packet::message("buffered")])
                    .expect("flush on drain");
            }
        });

        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        assert_eq!(decode_response(&exchange), vec![Packet::message("buffered")]);
        assert!(!transport.core().is_writable());
    }

    #[test]
    fn test_drain_flush_carries_deferred_close() {
        let transport = transport();
        let weak = Arc::downgrade(&transport);
        transport.core().on(EventKind::Drain, move |_| {
            if let Some(transport) = weak.upgrade() {
                let _ = transport.send_packets(vec![Packet::message("last")]);
            }
        });
        transport.shutdown("server close");

        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        assert_eq!(
            decode_response(&exchange),
            vec![Packet::message("last"), Packet::close()]
        );
        assert_eq!(transport.core().ready_state(), ReadyState::Closed);
    }

    #[test]
    fn test_undecodable_payload_reports_error() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());

        let exchange = data("garbage");
        transport.handle_exchange(exchange.clone());

        assert_eq!(recorder.count(EventKind::Error), 1);
        assert!(recorder.packets().is_empty());
        assert_eq!(&exchange.response().body()[..], b"ok");
    }

    #[test]
    fn test_binary_data_request() {
        init_tracing();
        let transport = XhrPollingTransport::new(TransportConfig::default(), Arc::new(TestCodec));
        let recorder = Recorder::attach(transport.core());
        let packet = Packet::message(vec![1u8, 2, 3]);
        let body = TestCodec.encode_payload(std::slice::from_ref(&packet), true);
        assert!(body.is_binary());

        let exchange = Exchange::builder("POST")
            .header("Content-Type", "application/octet-stream")
            .body(body.into_bytes())
            .build();
        transport.handle_exchange(exchange);

        assert_eq!(recorder.packets(), vec![packet]);
    }

    #[test]
    fn test_binary_payload_content_type() {
        init_tracing();
        let transport = XhrPollingTransport::new(TransportConfig::default(), Arc::new(TestCodec));
        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        transport
            .send_packets(vec![Packet::message(vec![9u8, 9])])
            .expect("send");

        assert_eq!(
            exchange.response().headers().get("Content-Type"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_xss_header_for_legacy_ie_only() {
        let transport = transport();

        let ie = Exchange::builder("GET")
            .header("User-Agent", "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0)")
            .build();
        transport.handle_exchange(ie.clone());
        transport.send_packets(vec![Packet::noop()]).unwrap();
        assert_eq!(ie.response().headers().get("X-XSS-Protection"), Some("0"));

        let modern = Exchange::builder("GET")
            .header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/140.0")
            .build();
        transport.handle_exchange(modern.clone());
        transport.send_packets(vec![Packet::noop()]).unwrap();
        assert!(!modern.response().headers().contains("X-XSS-Protection"));
    }

    #[test]
    fn test_poll_released_after_external_end() {
        let transport = transport();
        let exchange = poll();
        transport.handle_exchange(exchange.clone());

        exchange.response().end(200, "closed").unwrap();

        assert!(!transport.has_poll());
        assert!(!transport.core().is_writable());
        assert_eq!(exchange.response().hook_count(), 0);
    }

    #[test]
    fn test_text_packet_data_preserved() {
        let transport = transport();
        let recorder = Recorder::attach(transport.core());
        let packet = Packet::with_data(PacketType::Ping, PacketData::Text("check".into()));

        transport.handle_exchange(data(&TestCodec.payload(std::slice::from_ref(&packet))));

        assert_eq!(recorder.packets(), vec![packet]);
    }

    #[test]
    fn test_transport_trait_wrappers() {
        let transport = transport();
        let exchange = poll();

        tokio_test::block_on(async {
            transport.bind_exchange(exchange.clone()).await.unwrap();
            transport.send(vec![Packet::message("x")]).await.unwrap();
            transport.close("done").await;
        });

        assert_eq!(decode_response(&exchange), vec![Packet::message("x")]);
        assert_eq!(transport.ready_state(), ReadyState::Closing);
        assert!(transport.core().should_close());
        assert_eq!(transport.name(), "polling");
    }

    fn message_strategy() -> impl Strategy<Value = Vec<Packet>> {
        prop::collection::vec("[a-z0-9 ]{0,12}", 1..8)
            .prop_map(|texts| texts.into_iter().map(Packet::message).collect())
    }

    proptest! {
        #[test]
        fn prop_payload_order_survives_send_and_receive(packets in message_strategy()) {
            let server = transport();
            let exchange = poll();
            server.handle_exchange(exchange.clone());
            server.send_packets(packets.clone()).unwrap();
            let body = String::from_utf8(exchange.response().body().to_vec()).unwrap();

            let receiver = transport();
            let recorder = Recorder::attach(receiver.core());
            receiver.handle_exchange(data(&body));

            prop_assert_eq!(recorder.packets(), packets);
        }
    }
}
