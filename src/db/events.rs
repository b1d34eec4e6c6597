//! Connection state-change notifications
//!
//! A small handler registry shared by drivers and proxies. Handlers are
//! invoked outside the registry lock so a handler may subscribe or
//! unsubscribe without deadlocking.

use crate::db::types::ConnectionState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Arguments of a state-change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeEvent {
    pub original: ConnectionState,
    pub current: ConnectionState,
}

impl StateChangeEvent {
    pub fn new(original: ConnectionState, current: ConnectionState) -> Self {
        Self { original, current }
    }
}

/// Callback receiving state-change notifications
pub type StateChangeHandler = Arc<dyn Fn(&StateChangeEvent) + Send + Sync>;

/// Token returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of state-change handlers
#[derive(Default)]
pub struct StateChangeEvents {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, StateChangeHandler)>>,
}

impl StateChangeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn subscribe(&self, handler: StateChangeHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    /// Remove a handler. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    /// Invoke every registered handler with `event`
    pub fn raise(&self, event: &StateChangeEvent) {
        let snapshot: Vec<StateChangeHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StateChangeEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChangeEvents")
            .field("handlers", &self.len())
            .finish()
    }
}
