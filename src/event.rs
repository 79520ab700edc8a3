//! Completion events and readiness tokens for accelerator-resident buffers.
//!
//! Memory written by asynchronous device work is not valid for host reads
//! until that work completes. A buffer wrapping such memory carries a
//! [`ReadinessToken`]; every accessor operation consumes the token (waits on
//! all of its events) before touching the memory.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// An asynchronous operation whose completion can be awaited.
pub trait CompletionEvent: Send + Sync {
    /// Block until the operation has completed.
    fn wait(&self);

    /// Whether the operation has already completed.
    fn is_complete(&self) -> bool;
}

/// A host-side, manually signalled completion event.
///
/// Clones share the same state, so one clone can be handed to the producer
/// and another attached to a buffer.
#[derive(Clone, Default)]
pub struct HostEvent {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl HostEvent {
    /// A new event in the pending state.
    pub fn new() -> Self {
        Self::default()
    }

    /// An event that is already complete.
    pub fn completed() -> Self {
        let event = Self::new();
        event.signal();
        event
    }

    /// Mark the event complete and wake all waiters.
    pub fn signal(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock() = true;
        cvar.notify_all();
    }
}

impl CompletionEvent for HostEvent {
    fn wait(&self) {
        let (lock, cvar) = &*self.state;
        let mut done = lock.lock();
        while !*done {
            cvar.wait(&mut done);
        }
    }

    fn is_complete(&self) -> bool {
        *self.state.0.lock()
    }
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEvent")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// The set of events that must complete before host code may read a buffer.
#[derive(Clone, Default)]
pub struct ReadinessToken {
    events: Vec<Arc<dyn CompletionEvent>>,
}

impl ReadinessToken {
    pub fn new(events: Vec<Arc<dyn CompletionEvent>>) -> Self {
        Self { events }
    }

    /// Add one more prerequisite event.
    pub fn push<E: CompletionEvent + 'static>(&mut self, event: E) {
        self.events.push(Arc::new(event));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether every event has completed.
    pub fn is_ready(&self) -> bool {
        self.events.iter().all(|e| e.is_complete())
    }

    /// Wait on every event, consuming the token.
    pub fn wait(self) {
        for event in &self.events {
            event.wait();
        }
    }
}

impl fmt::Debug for ReadinessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessToken")
            .field("events", &self.events.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<E: CompletionEvent + 'static> FromIterator<E> for ReadinessToken {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            events: iter
                .into_iter()
                .map(|e| Arc::new(e) as Arc<dyn CompletionEvent>)
                .collect(),
        }
    }
}
