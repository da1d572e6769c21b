//! Typed listener registry.
//!
//! Replaces string-keyed event emitters with an explicit contract: each
//! event type names its kinds, every registration returns a [`ListenerId`],
//! and the only way to drop a listener is to hand that id back.
//!
//! # Re-entrancy
//!
//! [`Listeners::emit`] snapshots the matching handlers and releases the lock
//! before invoking them, so a handler may register, unregister or trigger
//! further emissions on the same registry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// An event that can be dispatched through [`Listeners`].
pub trait Event: Send + Sync + 'static {
    /// Discriminant used to select handlers.
    type Kind: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Returns the kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// Shared handler callback.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// One registration.
struct Entry<E: Event> {
    id: ListenerId,
    kind: E::Kind,
    handler: Handler<E>,
}

// ============================================================================
// Listeners
// ============================================================================

/// Thread-safe registry of handlers keyed by event kind.
pub struct Listeners<E: Event> {
    entries: Mutex<Vec<Entry<E>>>,
}

impl<E: Event> Listeners<E> {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Registers `handler` for events of `kind`.
    ///
    /// Returns the id needed to unregister it.
    pub fn add<F>(&self, kind: E::Kind, handler: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.entries.lock().push(Entry {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Unregisters a listener.
    ///
    /// Returns `false` if the id was unknown (already removed).
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Returns `true` if at least one handler listens for `kind`.
    #[must_use]
    pub fn has(&self, kind: E::Kind) -> bool {
        self.entries.lock().iter().any(|entry| entry.kind == kind)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Dispatches `event` to every handler of its kind, in registration order.
    ///
    /// Returns how many handlers were invoked.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler<E>> = self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| Arc::clone(&entry.handler))
            .collect();

        for handler in &handlers {
            handler(event);
        }

        handlers.len()
    }
}

impl<E: Event> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        let kinds: Vec<_> = entries.iter().map(|entry| (entry.id, entry.kind)).collect();
        f.debug_struct("Listeners").field("entries", &kinds).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
