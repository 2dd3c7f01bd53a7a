//! Named boolean signal shared between a waiter and a signaler.
//!
//! A behavior creates an [`Event`], hands a clone to whoever will complete the
//! operation (a timer, a sensor trigger, a device completion) and adds it to
//! its state machine's wait set. Signaling is idempotent and sticky until the
//! next [`Event::clear`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
struct EventInner {
    name: String,
    signaled: AtomicBool,
}

/// Cloneable handle onto a single signal.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Create a cleared event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                name: name.into(),
                signaled: AtomicBool::new(false),
            }),
        }
    }

    /// Event name (for logging).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Set the event. Idempotent.
    #[inline]
    pub fn signal(&self) {
        self.inner.signaled.store(true, Ordering::Release);
    }

    /// Reset the event to the cleared state.
    #[inline]
    pub fn clear(&self) {
        self.inner.signaled.store(false, Ordering::Release);
    }

    /// Whether the event has been signaled since the last clear.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.inner.signaled.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same event.
    pub fn same_as(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
