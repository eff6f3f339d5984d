use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Synchronous publish/subscribe fan-out.
///
/// Subscribers are invoked in registration order on the publishing thread;
/// there is no buffering and no delivery guarantee when nothing is
/// connected at publish time. The subscriber list supports connecting and
/// disconnecting concurrently with an in-flight publish.
pub struct Signal<T> {
    slots: Arc<Mutex<SlotList<T>>>,
}

struct SlotList<T> {
    next_id: u64,
    slots: Vec<(u64, Handler<T>)>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(SlotList {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Register a subscriber and return its disposable connection token.
    pub fn connect(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Connection {
        let mut list = lock(&self.slots);
        let id = list.next_id;
        list.next_id += 1;
        list.slots.push((id, Arc::new(handler)));

        let slots = Arc::downgrade(&self.slots);
        Connection {
            cancel: Some(Box::new(move || {
                if let Some(slots) = slots.upgrade() {
                    lock(&slots).slots.retain(|(slot_id, _)| *slot_id != id);
                }
            })),
        }
    }

    /// Invoke every currently-connected subscriber with `value`, in
    /// registration order, on the calling thread. With zero subscribers the
    /// value is simply discarded.
    pub fn publish(&self, value: &T) {
        // Snapshot the handlers so subscribers may connect or disconnect
        // from inside a callback without deadlocking.
        let handlers: Vec<Handler<T>> = lock(&self.slots)
            .slots
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(value);
        }
    }

    pub fn is_connected(&self) -> bool {
        !lock(&self.slots).slots.is_empty()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Token returned by [`Signal::connect`].
///
/// `disconnect` removes the subscriber from future publishes. Dropping the
/// token without calling it leaves the subscription live for the lifetime
/// of the signal.
pub struct Connection {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Connection {
    pub fn disconnect(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Mutex access that survives a panicked subscriber rather than poisoning
/// every later publish.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
