//! Front-end event delivery: `on_transcription`/`on_command`/`on_result`
//! callbacks, and the error type for failures delivering to them.
//!
//! A panicking or slow front-end listener is never conflated with a
//! Core-internal [`jarvis_types::JarvisError`] — it belongs to the bus,
//! not the pipeline that produced the event.

use std::panic::AssertUnwindSafe;
use std::sync::RwLock;
use std::time::Duration;

use thiserror::Error;

/// Failures delivering an event to a registered front-end listener.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    /// The listener panicked while handling the event.
    #[error("front-end listener panicked: {0}")]
    ListenerPanicked(String),
}

type Listener<T> = Box<dyn Fn(T) + Send + Sync>;

/// A single-slot callback registration, matching the front-end contract's
/// "register a callback, replacing any previous one" usage.
pub struct EventSlot<T> {
    listener: RwLock<Option<Listener<T>>>,
}

impl<T> Default for EventSlot<T> {
    fn default() -> Self {
        Self { listener: RwLock::new(None) }
    }
}

impl<T> EventSlot<T> {
    /// Register `f`, replacing whatever was registered before.
    pub fn set(&self, f: impl Fn(T) + Send + Sync + 'static) {
        *self.listener.write().expect("event slot poisoned") = Some(Box::new(f));
    }

    /// Clear any registered listener.
    pub fn clear(&self) {
        *self.listener.write().expect("event slot poisoned") = None;
    }

    /// Deliver `value` to the registered listener, if any. A panicking
    /// listener is caught and reported as a [`BusError`] rather than
    /// unwinding into the turn pipeline that raised the event.
    pub fn emit(&self, value: T) -> Result<(), BusError>
    where
        T: std::panic::UnwindSafe,
    {
        let guard = self.listener.read().expect("event slot poisoned");
        let Some(listener) = guard.as_ref() else {
            return Ok(());
        };
        std::panic::catch_unwind(AssertUnwindSafe(|| listener(value)))
            .map_err(|_| BusError::ListenerPanicked("front-end callback panicked".to_string()))
    }
}

/// Fixed expiry the front-end is expected to resolve a delivered
/// confirmation prompt within, mirroring [`jarvis_authority::DEFAULT_EXPIRES_IN_SECONDS`].
pub const LISTENER_GRACE: Duration = Duration::from_secs(60);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emit_with_no_listener_is_a_noop() {
        let slot: EventSlot<String> = EventSlot::default();
        assert!(slot.emit("hello".to_string()).is_ok());
    }

    #[test]
    fn emit_delivers_to_the_registered_listener() {
        let slot: EventSlot<String> = EventSlot::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        slot.set(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        slot.emit("hi".to_string()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_is_reported_as_bus_error_not_unwound() {
        let slot: EventSlot<String> = EventSlot::default();
        slot.set(|_| panic!("boom"));
        let result = slot.emit("hi".to_string());
        assert!(matches!(result, Err(BusError::ListenerPanicked(_))));
    }

    #[test]
    fn setting_a_new_listener_replaces_the_old_one() {
        let slot: EventSlot<String> = EventSlot::default();
        let seen = Arc::new(AtomicUsize::new(0));
        slot.set(|_| panic!("should never run"));
        let seen_clone = seen.clone();
        slot.set(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        slot.emit("hi".to_string()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
