//! Subscriber lists for client notifications.
//!
//! Callbacks are invoked synchronously, in registration order, with a
//! borrowed snapshot of the payload. A callback must not register further
//! callbacks on the same list while it is being notified.

use std::sync::{Mutex, MutexGuard};

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

pub struct Subscribers<T> {
    callbacks: Mutex<Vec<Callback<T>>>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    fn callbacks(&self) -> MutexGuard<'_, Vec<Callback<T>>> {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.callbacks().push(Box::new(callback));
    }

    pub fn emit(&self, payload: &T) {
        for callback in self.callbacks().iter() {
            callback(payload);
        }
    }

    /// Produce the payload and notify everyone under one lock, so that
    /// concurrent emitters are delivered in the order they produced.
    pub fn emit_after<F>(&self, produce: F) -> T
    where
        F: FnOnce() -> T,
    {
        let callbacks = self.callbacks();
        let payload = produce();
        for callback in callbacks.iter() {
            callback(&payload);
        }
        payload
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}
