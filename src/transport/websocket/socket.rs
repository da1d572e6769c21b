//! Socket seam for the WebSocket carrier.
//!
//! [`WebSocket`] is what the HTTP layer attaches to an upgraded exchange.
//! [`TungsteniteSocket`] adapts any `tokio-tungstenite` stream to it.
//!
//! # Frame Mapping
//!
//! | Inbound frame | `receive()` |
//! |---------------|-------------|
//! | Text | `Some(Encoded::Text)` |
//! | Binary | `Some(Encoded::Binary)` |
//! | Ping / Pong / raw Frame | skipped |
//! | Close, end of stream | `None` |
//! | `ConnectionClosed` / `AlreadyClosed` | `None` |
//! | Any other error | `Err` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::trace;

use crate::error::Result;
use crate::protocol::Encoded;

// ============================================================================
// WebSocket
// ============================================================================

/// An upgraded full-duplex socket.
///
/// `receive` and `send` may run concurrently from different tasks.
#[async_trait]
pub trait WebSocket: Send + Sync + 'static {
    /// Waits for the next data frame.
    ///
    /// Returns `Ok(None)` once the peer closed or the stream ended.
    ///
    /// # Errors
    ///
    /// Returns an error for a failed read; the socket may still be usable.
    async fn receive(&self) -> Result<Option<Encoded>>;

    /// Sends one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be written.
    async fn send(&self, data: Encoded) -> Result<()>;

    /// Closes the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the close frame could not be written.
    async fn close(&self) -> Result<()>;
}

// ============================================================================
// TungsteniteSocket
// ============================================================================

/// [`WebSocket`] over a `tokio-tungstenite` stream.
///
/// The stream is split so reads and writes lock independently.
pub struct TungsteniteSocket<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> TungsteniteSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an accepted or connected stream.
    #[must_use]
    pub fn new(stream: WebSocketStream<S>) -> Self {
        let (sink, stream) = stream.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl<S> WebSocket for TungsteniteSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn receive(&self) -> Result<Option<Encoded>> {
        let mut stream = self.stream.lock().await;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Encoded::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => return Ok(Some(Encoded::Binary(data))),
                Some(Ok(Message::Close(frame))) => {
                    trace!(?frame, "Close frame received");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn send(&self, data: Encoded) -> Result<()> {
        let message = match data {
            Encoded::Text(text) => Message::text(text),
            Encoded::Binary(data) => Message::binary(data),
        };
        self.sink.lock().await.send(message).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        match self.sink.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<S> fmt::Debug for TungsteniteSocket<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TungsteniteSocket").finish_non_exhaustive()
    }
}
