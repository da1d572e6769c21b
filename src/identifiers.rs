//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing an exchange identity with a listener
//! registration handle.
//!
//! | Type | Backing | Purpose |
//! |------|---------|---------|
//! | [`ExchangeId`] | UUID v4 | Identity of one request/response pair |
//! | [`ListenerId`] | `u64` | Handle returned by every listener registration |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ExchangeId
// ============================================================================

/// Identity of one inbound exchange.
///
/// Two handles to the same exchange compare equal; this is how a transport
/// tells a re-bound poll apart from an overlapping one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    /// Generates a fresh random identifier.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Monotonic source for listener handles.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for one listener registration.
///
/// Every `add`/`on` call returns a fresh id; the same id is the only way to
/// unregister that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates the next process-unique id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
