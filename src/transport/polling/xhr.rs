//! Plain body framing.
//!
//! The payload is the response body as-is; binary request bodies are passed
//! through untouched and text bodies must be valid UTF-8.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::protocol::{Codec, Encoded};
use crate::transport::config::TransportConfig;

use super::{PollingFormat, PollingTransport};

// ============================================================================
// Xhr
// ============================================================================

/// Plain long-polling framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xhr;

impl PollingFormat for Xhr {
    fn answers_preflight(&self) -> bool {
        true
    }

    fn decode_body(&self, exchange: &Exchange) -> Result<Option<Encoded>> {
        let body = exchange.body().clone();
        if exchange.is_binary() {
            return Ok(Some(Encoded::Binary(body)));
        }

        String::from_utf8(body.to_vec())
            .map(|text| Some(Encoded::Text(text)))
            .map_err(|e| Error::protocol(format!("data request body is not UTF-8: {e}")))
    }

    fn frame(&self, _exchange: &Exchange, payload: Encoded) -> Result<Encoded> {
        Ok(payload)
    }
}

impl PollingTransport<Xhr> {
    /// Creates a plain long-polling transport.
    #[must_use]
    pub fn new(config: TransportConfig, codec: Arc<dyn Codec>) -> Arc<Self> {
        Self::with_format(Xhr, config, codec)
    }
}

// ============================================================================
// Tests
// ============================================================================
