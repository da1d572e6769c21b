//! Outbound half of an exchange.
//!
//! A [`Response`] is a shared handle: the transport writes into it, the
//! HTTP layer waits on [`Response::completed`] and serializes whatever was
//! finalized.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──end()──► [PreEnd hooks] ──► Ended ──► [PostEnd hooks]
//!    │
//!    └────abort()──────────────────────► Aborted ─► [PostEnd hooks]
//! ```
//!
//! Finalization happens once. A second `end` returns
//! [`Error::ResponseAlreadyEnded`]; a second `abort` is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{ExchangeId, ListenerId};
use crate::listeners::{Event, Listeners};

use super::HeaderMap;

// ============================================================================
// Constants
// ============================================================================

/// Status used while nothing has been decided.
const DEFAULT_STATUS: u16 = 200;

// ============================================================================
// Outcome
// ============================================================================

/// How a response was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not finalized yet.
    Pending,
    /// Ended with a status and body.
    Ended,
    /// Torn down without a response.
    Aborted,
}

impl Outcome {
    /// Returns `true` once the response can no longer change.
    #[inline]
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ============================================================================
// ResponseHook
// ============================================================================

/// Lifecycle notifications fired by a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHook {
    /// About to finalize; nothing more can be appended after this.
    PreEnd,
    /// Finalized (ended or aborted).
    PostEnd,
}

impl Event for ResponseHook {
    type Kind = Self;

    fn kind(&self) -> Self::Kind {
        *self
    }
}

// ============================================================================
// Response
// ============================================================================

/// Mutable state behind the handle.
struct ResponseState {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
    outcome: Outcome,
    finalizing: bool,
}

/// Shared inner data.
struct ResponseInner {
    exchange_id: ExchangeId,
    state: Mutex<ResponseState>,
    hooks: Listeners<ResponseHook>,
    outcome_tx: watch::Sender<Outcome>,
}

/// Outbound half of an exchange.
///
/// Cloning yields another handle to the same response.
#[derive(Clone)]
pub struct Response {
    inner: Arc<ResponseInner>,
}

// ============================================================================
// Response - Constructor
// ============================================================================

impl Response {
    /// Creates a pending response for `exchange_id`.
    #[must_use]
    pub(crate) fn new(exchange_id: ExchangeId) -> Self {
        let (outcome_tx, _) = watch::channel(Outcome::Pending);

        Self {
            inner: Arc::new(ResponseInner {
                exchange_id,
                state: Mutex::new(ResponseState {
                    status: DEFAULT_STATUS,
                    headers: HeaderMap::new(),
                    body: BytesMut::new(),
                    outcome: Outcome::Pending,
                    finalizing: false,
                }),
                hooks: Listeners::new(),
                outcome_tx,
            }),
        }
    }
}

// ============================================================================
// Response - Accessors
// ============================================================================

impl Response {
    /// Returns the owning exchange's id.
    #[inline]
    #[must_use]
    pub fn exchange_id(&self) -> ExchangeId {
        self.inner.exchange_id
    }

    /// Returns `true` once the response was ended or aborted.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.outcome().is_final()
    }

    /// Returns the current outcome.
    #[inline]
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.inner.state.lock().outcome
    }

    /// Returns the status code.
    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        self.inner.state.lock().status
    }

    /// Returns a copy of the headers.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.inner.state.lock().headers.clone()
    }

    /// Returns a copy of the body written so far.
    #[must_use]
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.inner.state.lock().body)
    }

    /// Returns the number of registered lifecycle hooks.
    #[inline]
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.len()
    }
}

// ============================================================================
// Response - Writing
// ============================================================================

impl Response {
    /// Sets the status code.
    pub fn set_status(&self, status: u16) {
        self.inner.state.lock().status = status;
    }

    /// Sets one header, replacing any previous value.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.state.lock().headers.insert(name, value);
    }

    /// Merges `headers` into the response headers.
    pub fn merge_headers(&self, headers: &HeaderMap) {
        self.inner.state.lock().headers.extend_from(headers);
    }

    /// Appends bytes to the body.
    pub fn append_body(&self, chunk: &[u8]) {
        self.inner.state.lock().body.extend_from_slice(chunk);
    }

    /// Finalizes with `status`, appending `body`.
    ///
    /// Fires [`ResponseHook::PreEnd`] before the state changes and
    /// [`ResponseHook::PostEnd`] after.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseAlreadyEnded`] if the response was already
    /// ended, aborted, or is being ended by another path.
    pub fn end(&self, status: u16, body: impl AsRef<[u8]>) -> Result<()> {
        self.begin_finalize()?;
        self.inner.hooks.emit(&ResponseHook::PreEnd);

        {
            let mut state = self.inner.state.lock();
            state.finalizing = false;
            if state.outcome.is_final() {
                return Err(Error::response_already_ended(self.inner.exchange_id));
            }
            state.status = status;
            state.body.extend_from_slice(body.as_ref());
            state.outcome = Outcome::Ended;
            trace!(
                exchange = %self.inner.exchange_id,
                status,
                len = state.body.len(),
                "Response ended"
            );
        }

        self.inner.outcome_tx.send_replace(Outcome::Ended);
        self.inner.hooks.emit(&ResponseHook::PostEnd);
        Ok(())
    }

    /// Finalizes with the status and body already written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseAlreadyEnded`] if already finalized.
    pub fn finish(&self) -> Result<()> {
        let status = self.status();
        self.end(status, b"")
    }

    /// Tears the exchange down without a response.
    ///
    /// Fires [`ResponseHook::PostEnd`]. Returns `false` if the response was
    /// already finalized.
    pub fn abort(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.outcome.is_final() {
                return false;
            }
            state.outcome = Outcome::Aborted;
        }

        trace!(exchange = %self.inner.exchange_id, "Response aborted");
        self.inner.outcome_tx.send_replace(Outcome::Aborted);
        self.inner.hooks.emit(&ResponseHook::PostEnd);
        true
    }

    /// Waits until the response is finalized.
    ///
    /// Used by the HTTP layer to know when to serialize the response.
    pub async fn completed(&self) -> Outcome {
        let mut rx = self.inner.outcome_tx.subscribe();
        match rx.wait_for(|outcome| outcome.is_final()).await {
            Ok(outcome) => *outcome,
            Err(_) => Outcome::Aborted,
        }
    }

    /// Marks the response as finalizing, rejecting concurrent finalization.
    fn begin_finalize(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.outcome.is_final() || state.finalizing {
            return Err(Error::response_already_ended(self.inner.exchange_id));
        }
        state.finalizing = true;
        Ok(())
    }
}

// ============================================================================
// Response - Hooks
// ============================================================================

impl Response {
    /// Registers a hook fired right before the response is finalized.
    pub fn on_pre_end<F>(&self, hook: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.hooks.add(ResponseHook::PreEnd, move |_| hook())
    }

    /// Registers a hook fired once the response is finalized.
    pub fn on_post_end<F>(&self, hook: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.hooks.add(ResponseHook::PostEnd, move |_| hook())
    }

    /// Unregisters a hook. Returns `false` if it was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.hooks.remove(id)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Response")
            .field("exchange_id", &self.inner.exchange_id)
            .field("status", &state.status)
            .field("outcome", &state.outcome)
            .field("headers", &state.headers)
            .field("body_len", &state.body.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
