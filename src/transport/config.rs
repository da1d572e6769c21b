//! Transport construction options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use engine_transport::TransportConfig;
//!
//! let config = TransportConfig::new()
//!     .with_supports_binary(false)
//!     .with_heartbeat_interval(Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default heartbeat interval.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Default heartbeat timeout.
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default close timeout.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// TransportConfig
// ============================================================================

/// Options a dispatcher passes when constructing a transport.
///
/// Only `supports_binary` affects this crate. The heartbeat and close
/// timings are carried for the session layer, which owns the timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Whether the client accepts binary wire data.
    pub supports_binary: bool,

    /// Interval between heartbeats.
    pub heartbeat_interval: Duration,

    /// Time without a heartbeat before the session is dropped.
    pub heartbeat_timeout: Duration,

    /// Grace period for an orderly close.
    pub close_timeout: Duration,
}

// ============================================================================
// Constructors
// ============================================================================

impl TransportConfig {
    /// Creates a config with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            supports_binary: true,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Creates a config for text-only clients.
    #[inline]
    #[must_use]
    pub const fn text_only() -> Self {
        Self {
            supports_binary: false,
            ..Self::new()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportConfig {
    /// Sets binary support.
    #[inline]
    #[must_use]
    pub const fn with_supports_binary(mut self, supports_binary: bool) -> Self {
        self.supports_binary = supports_binary;
        self
    }

    /// Sets the heartbeat interval.
    #[inline]
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the heartbeat timeout.
    #[inline]
    #[must_use]
    pub const fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Sets the close timeout.
    #[inline]
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl TransportConfig {
    /// Checks the timings for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the heartbeat interval is zero or not
    /// shorter than the heartbeat timeout.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("heartbeat interval must be non-zero"));
        }
        if self.heartbeat_interval >= self.heartbeat_timeout {
            return Err(Error::config(format!(
                "heartbeat interval {:?} must be shorter than timeout {:?}",
                self.heartbeat_interval, self.heartbeat_timeout
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
