//! Cross-origin header merge.

// ============================================================================
// Imports
// ============================================================================

use crate::exchange::{Exchange, HeaderMap};

// ============================================================================
// Constants
// ============================================================================

/// Methods advertised to a preflight.
const ALLOWED_METHODS: &str = "POST, GET, OPTIONS";

/// Preflight cache lifetime in seconds.
const PREFLIGHT_MAX_AGE: &str = "3600";

// ============================================================================
// Functions
// ============================================================================

/// Adds CORS headers for `exchange` to `headers`.
///
/// With an `Origin` header the origin is echoed and credentials are allowed;
/// without one the wildcard origin is used and credentials are not.
pub fn merge_cors(exchange: &Exchange, headers: &mut HeaderMap) {
    match exchange.header("origin") {
        Some(origin) => {
            headers.insert("Access-Control-Allow-Credentials", "true");
            headers.insert("Access-Control-Allow-Origin", origin);
        }
        None => {
            headers.insert("Access-Control-Allow-Origin", "*");
        }
    }
}

/// Builds the headers answering a CORS preflight.
#[must_use]
pub fn preflight_headers(exchange: &Exchange) -> HeaderMap {
    let mut headers = HeaderMap::new();
    merge_cors(exchange, &mut headers);
    headers.insert("Access-Control-Allow-Headers", "Content-Type");
    headers.insert("Access-Control-Allow-Methods", ALLOWED_METHODS);
    headers.insert("Access-Control-Max-Age", PREFLIGHT_MAX_AGE);
    headers
}

// ============================================================================
// Tests
// ============================================================================
