//! Exchanges: one inbound request paired with one outbound response.
//!
//! The HTTP layer builds an [`Exchange`] per inbound request and hands it to
//! a transport. The transport reads the request side and writes into the
//! shared [`Response`]; the HTTP layer awaits [`Response::completed`] and
//! serializes the result.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `headers` | Case-insensitive header map |
//! | `request` | Exchange handle, method, builder |
//! | `response` | Response handle and lifecycle hooks |

// ============================================================================
// Submodules
// ============================================================================

/// Case-insensitive header map.
pub mod headers;

/// Exchange handle and request side.
pub mod request;

/// Response handle.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use headers::HeaderMap;
pub use request::{BINARY_CONTENT_TYPE, Exchange, ExchangeBuilder, Method};
pub use response::{Outcome, Response, ResponseHook};
