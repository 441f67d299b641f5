// src/events/listener.rs
//
// Unsubscribe handle returned by every subscription.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Registration token. Tokens only grow, so token order is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

type Detach = Box<dyn FnOnce() + Send>;

/// Handle to exactly one registration.
///
/// `unsubscribe` is idempotent, including across clones of the same handle.
/// Dropping a `Listener` leaves the registration in place.
#[derive(Clone)]
pub struct Listener {
    id: Option<ListenerId>,
    detach: Arc<Mutex<Option<Detach>>>,
}

impl Listener {
    pub(crate) fn new<F>(id: ListenerId, detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: Some(id),
            detach: Arc::new(Mutex::new(Some(Box::new(detach)))),
        }
    }

    /// A handle that was never registered (subscription on a destroyed bus)
    pub(crate) fn inert() -> Self {
        Self {
            id: None,
            detach: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    pub fn unsubscribe(&self) {
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.detach.lock().is_some()
    }

    /// Used by the bus when a registration disappears through `off` or `destroy`
    pub(crate) fn disarm(&self) {
        self.detach.lock().take();
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unsubscribe_runs_once_across_clones() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let listener = Listener::new(ListenerId(1), move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        let copy = listener.clone();

        listener.unsubscribe();
        listener.unsubscribe();
        copy.unsubscribe();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!copy.is_active());
    }

    #[test]
    fn test_inert_listener() {
        let listener = Listener::inert();
        assert_eq!(listener.id(), None);
        assert!(!listener.is_active());
        listener.unsubscribe();
    }
}
