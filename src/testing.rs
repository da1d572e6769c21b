//! Test doubles shared by unit tests.
//!
//! | Double | Stands in for |
//! |--------|---------------|
//! | [`TestCodec`] | the engine packet/payload codec |
//! | [`Recorder`] | the session layer |
//! | [`FakeSocket`] | an upgraded socket |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::{Notify, mpsc};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::listeners::Event;
use crate::protocol::{Codec, DecodedPacket, Encoded, Packet, PacketData, PacketType};
use crate::transport::{EventKind, TransportCore, TransportError, TransportEvent, WebSocket};

// ============================================================================
// Tracing
// ============================================================================

/// Installs a test-writer subscriber once, honoring `RUST_LOG`.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TestCodec
// ============================================================================

/// Engine-style codec.
///
/// # Format
///
/// ```text
/// packet (text)    : <code digit><text>        e.g. 4hello
/// packet (b64)     : b<code digit><base64>     binary without binary support
/// packet (binary)  : <code byte><bytes>
/// payload (text)   : <len>:<packet>...         len counts chars
/// payload (binary) : <kind byte><u32 BE len><packet>...
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TestCodec;

impl TestCodec {
    /// Encodes `packets` as a text payload.
    pub(crate) fn payload(&self, packets: &[Packet]) -> String {
        match self.encode_payload(packets, false) {
            Encoded::Text(text) => text,
            Encoded::Binary(_) => unreachable!("text payload"),
        }
    }
}

fn packet_type(code: u8) -> Result<PacketType> {
    PacketType::from_code(code).ok_or_else(|| Error::protocol(format!("unknown packet code {code}")))
}

impl Codec for TestCodec {
    fn encode_packet(&self, packet: &Packet, supports_binary: bool) -> Encoded {
        let code = packet.packet_type.code();
        match &packet.data {
            None => Encoded::Text(code.to_string()),
            Some(PacketData::Text(text)) => Encoded::Text(format!("{code}{text}")),
            Some(PacketData::Binary(data)) if supports_binary => {
                let mut buf = BytesMut::with_capacity(data.len() + 1);
                buf.put_u8(code);
                buf.put_slice(data);
                Encoded::Binary(buf.freeze())
            }
            Some(PacketData::Binary(data)) => {
                Encoded::Text(format!("b{code}{}", STANDARD.encode(data)))
            }
        }
    }

    fn decode_packet(&self, data: Encoded) -> Result<Packet> {
        match data {
            Encoded::Binary(bytes) => {
                let (&code, rest) = bytes
                    .split_first()
                    .ok_or_else(|| Error::protocol("empty binary packet"))?;
                Ok(Packet::with_data(
                    packet_type(code)?,
                    Bytes::copy_from_slice(rest),
                ))
            }
            Encoded::Text(text) => {
                if let Some(encoded) = text.strip_prefix('b') {
                    let mut chars = encoded.chars();
                    let code = chars
                        .next()
                        .and_then(|c| c.to_digit(10))
                        .ok_or_else(|| Error::protocol("not a packet"))?;
                    let data = STANDARD
                        .decode(chars.as_str())
                        .map_err(|e| Error::protocol(e.to_string()))?;
                    return Ok(Packet::with_data(packet_type(code as u8)?, data));
                }

                let mut chars = text.chars();
                let code = chars
                    .next()
                    .and_then(|c| c.to_digit(10))
                    .ok_or_else(|| Error::protocol("not a packet"))?;
                let packet_type = packet_type(code as u8)?;
                let rest = chars.as_str();

                if rest.is_empty() && packet_type != PacketType::Message {
                    Ok(Packet::new(packet_type))
                } else {
                    Ok(Packet::with_data(packet_type, rest))
                }
            }
        }
    }

    fn encode_payload(&self, packets: &[Packet], supports_binary: bool) -> Encoded {
        if supports_binary && packets.iter().any(Packet::is_binary) {
            let mut buf = BytesMut::new();
            for packet in packets {
                let encoded = self.encode_packet(packet, true);
                buf.put_u8(u8::from(encoded.is_binary()));
                let bytes = encoded.into_bytes();
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(&bytes);
            }
            return Encoded::Binary(buf.freeze());
        }

        let mut out = String::new();
        for packet in packets {
            if let Encoded::Text(text) = self.encode_packet(packet, false) {
                out.push_str(&format!("{}:{text}", text.chars().count()));
            }
        }
        Encoded::Text(out)
    }

    fn decode_payload(&self, data: Encoded) -> Result<Vec<DecodedPacket>> {
        let mut encoded = Vec::new();

        match data {
            Encoded::Text(text) => {
                let mut rest = text.as_str();
                while !rest.is_empty() {
                    let (len, tail) = rest
                        .split_once(':')
                        .ok_or_else(|| Error::protocol("missing length"))?;
                    let len: usize = len
                        .parse()
                        .map_err(|_| Error::protocol("invalid length"))?;
                    let end = tail
                        .char_indices()
                        .nth(len)
                        .map_or(tail.len(), |(i, _)| i);
                    if tail[..end].chars().count() != len {
                        return Err(Error::protocol("truncated payload"));
                    }
                    encoded.push(Encoded::Text(tail[..end].to_owned()));
                    rest = &tail[end..];
                }
            }
            Encoded::Binary(bytes) => {
                let mut rest = &bytes[..];
                while !rest.is_empty() {
                    if rest.len() < 5 {
                        return Err(Error::protocol("truncated header"));
                    }
                    let kind = rest[0];
                    let len = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
                    let body = rest
                        .get(5..5 + len)
                        .ok_or_else(|| Error::protocol("truncated payload"))?;
                    encoded.push(if kind == 1 {
                        Encoded::Binary(Bytes::copy_from_slice(body))
                    } else {
                        let text = std::str::from_utf8(body)
                            .map_err(|e| Error::protocol(e.to_string()))?;
                        Encoded::Text(text.to_owned())
                    });
                    rest = &rest[5 + len..];
                }
            }
        }

        let total = encoded.len();
        encoded
            .into_iter()
            .enumerate()
            .map(|(index, data)| {
                Ok(DecodedPacket {
                    packet: self.decode_packet(data)?,
                    index,
                    total,
                })
            })
            .collect()
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Session-layer stand-in recording every transport event.
#[derive(Clone)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<TransportEvent>>>,
    notify: Arc<Notify>,
}

impl Recorder {
    /// Listens for every event kind on `core`.
    pub(crate) fn attach(core: &TransportCore) -> Self {
        let recorder = Self {
            events: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        };

        for kind in [
            EventKind::Packet,
            EventKind::Error,
            EventKind::Close,
            EventKind::Drain,
        ] {
            let events = Arc::clone(&recorder.events);
            let notify = Arc::clone(&recorder.notify);
            core.on(kind, move |event| {
                events.lock().push(event.clone());
                notify.notify_waiters();
            });
        }

        recorder
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub(crate) fn packets(&self) -> Vec<Packet> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Packet(packet) => Some(packet.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn errors(&self) -> Vec<TransportError> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    /// Waits until at least `n` events of `kind` were recorded.
    pub(crate) async fn wait_for(&self, kind: EventKind, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.count(kind) >= n {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// FakeSocket
// ============================================================================

type Incoming = std::result::Result<Encoded, String>;

/// State shared between a [`FakeSocket`] and its [`FakeSocketHandle`].
#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<Encoded>>,
    failing: Mutex<FxHashSet<usize>>,
    attempts: AtomicUsize,
    closed: AtomicBool,
}

/// Scripted [`WebSocket`].
pub(crate) struct FakeSocket {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    shared: Arc<Shared>,
}

/// Test-side controls of a [`FakeSocket`].
pub(crate) struct FakeSocketHandle {
    sender: Mutex<Option<mpsc::UnboundedSender<Incoming>>>,
    shared: Arc<Shared>,
}

impl FakeSocket {
    pub(crate) fn pair() -> (Self, FakeSocketHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        (
            Self {
                incoming: tokio::sync::Mutex::new(rx),
                shared: Arc::clone(&shared),
            },
            FakeSocketHandle {
                sender: Mutex::new(Some(tx)),
                shared,
            },
        )
    }
}

impl FakeSocketHandle {
    /// Queues an inbound frame.
    pub(crate) fn push(&self, data: impl Into<Encoded>) {
        self.queue(Ok(data.into()));
    }

    /// Queues a read failure.
    pub(crate) fn push_error(&self, message: &str) {
        self.queue(Err(message.to_owned()));
    }

    /// Ends the inbound stream after the queued frames.
    pub(crate) fn end(&self) {
        self.sender.lock().take();
    }

    /// Makes the send attempt with zero-based `index` fail.
    pub(crate) fn fail_send(&self, index: usize) {
        self.shared.failing.lock().insert(index);
    }

    pub(crate) fn sent(&self) -> Vec<Encoded> {
        self.shared.sent.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn queue(&self, item: Incoming) {
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(item);
        }
    }
}

#[async_trait]
impl WebSocket for FakeSocket {
    async fn receive(&self) -> Result<Option<Encoded>> {
        match self.incoming.lock().await.recv().await {
            Some(Ok(data)) => Ok(Some(data)),
            Some(Err(message)) => Err(Error::socket(message)),
            None => Ok(None),
        }
    }

    async fn send(&self, data: Encoded) -> Result<()> {
        let attempt = self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.failing.lock().contains(&attempt) {
            return Err(Error::socket("send failed"));
        }
        self.shared.sent.lock().push(data);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

mod tests {
    use super::*;

    #[test]
    fn test_codec_text_payload() {
        let packets = vec![Packet::message("hé"), Packet::noop(), Packet::close()];
        let payload = TestCodec.payload(&packets);
        assert_eq!(payload, "3:4hé1:61:1");

        let decoded = TestCodec.decode_payload(Encoded::Text(payload)).unwrap();
        let decoded: Vec<_> = decoded.into_iter().map(|d| d.packet).collect();
        assert_eq!(decoded, packets);
    }

    #[test]
    fn test_codec_binary_fallback_to_base64() {
        let packet = Packet::message(vec![1u8, 2, 3]);
        let encoded = TestCodec.encode_packet(&packet, false);
        assert_eq!(encoded, Encoded::Text("b4AQID".into()));
        assert_eq!(TestCodec.decode_packet(encoded).unwrap(), packet);
    }

    #[test]
    fn test_codec_rejects_garbage() {
        assert!(TestCodec.decode_packet("not a packet".into()).is_err());
        assert!(TestCodec.decode_payload("garbage".into()).is_err());
        assert!(TestCodec.decode_payload("9:4x".into()).is_err());
    }
}
