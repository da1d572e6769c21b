//! Script-injection framing.
//!
//! The client loads each poll as a `<script>` and posts data through a form:
//!
//! ```text
//! poll response : ___eio[<index>]("<json-escaped payload>");
//! data request  : d=<url-encoded payload>
//! ```
//!
//! The index comes from the `j` query parameter (digits only), falling back
//! to `i`, then `0`. Only text payloads can be carried.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use tracing::debug;
use url::form_urlencoded;

use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::protocol::{Codec, Encoded};
use crate::transport::config::TransportConfig;

use super::{POLLING, PollingFormat, PollingTransport};

// ============================================================================
// Constants
// ============================================================================

/// Form field carrying the payload of a data request.
const DATA_FIELD: &str = "d";

/// Escaped newlines, optionally preceded by an escaped backslash.
static ESCAPED_NEWLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\)?\\n").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

// ============================================================================
// Jsonp
// ============================================================================

/// Script-injection long-polling framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jsonp;

impl PollingFormat for Jsonp {
    fn forces_text(&self) -> bool {
        true
    }

    fn decode_body(&self, exchange: &Exchange) -> Result<Option<Encoded>> {
        if exchange.is_binary() {
            debug!(transport = POLLING, "Binary body on script-injection transport");
            return Ok(None);
        }

        let data = form_urlencoded::parse(exchange.body())
            .find(|(key, _)| key == DATA_FIELD)
            .map(|(_, value)| value.into_owned());

        match data {
            Some(data) => Ok(Some(Encoded::Text(unescape_newlines(&data).into_owned()))),
            None => {
                debug!(transport = POLLING, "Data request without `d` field");
                Ok(None)
            }
        }
    }

    fn frame(&self, exchange: &Exchange, payload: Encoded) -> Result<Encoded> {
        let Encoded::Text(text) = payload else {
            return Err(Error::unsupported_payload(
                POLLING,
                "script-injection framing carries text only",
            ));
        };

        let json = serde_json::to_string(&text)?
            .replace('\u{2028}', "\\u2028")
            .replace('\u{2029}', "\\u2029");

        Ok(Encoded::Text(format!(
            "___eio[{}]({json});",
            callback_index(exchange)
        )))
    }
}

impl PollingTransport<Jsonp> {
    /// Creates a script-injection long-polling transport.
    ///
    /// Binary support is always disabled.
    #[must_use]
    pub fn new(config: TransportConfig, codec: Arc<dyn Codec>) -> Arc<Self> {
        Self::with_format(Jsonp, config, codec)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolves the callback index from `j` (digits only), then `i`, then `0`.
fn callback_index(exchange: &Exchange) -> String {
    let from_j: String = exchange
        .query_param("j")
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if !from_j.is_empty() {
        return from_j;
    }

    let from_i: String = exchange
        .query_param("i")
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if from_i.is_empty() { "0".to_owned() } else { from_i }
}

/// Turns `\n` into a newline, keeping `\\n` intact.
fn unescape_newlines(data: &str) -> Cow<'_, str> {
    ESCAPED_NEWLINE.replace_all(data, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_owned()
        } else {
            "\n".to_owned()
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
