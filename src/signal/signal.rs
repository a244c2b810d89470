use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use std::sync::Arc;

struct SignalInner<T> {
    value: RwLock<T>,
    id: usize,
    runtime: Arc<ReactiveRuntime>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        self.runtime.remove_source(self.id);
    }
}

/// A reactive signal that holds a value and notifies subscribers when changed.
///
/// A signal binds to the runtime that is current when it is created and keeps
/// using it, so a handle moved into a future or another thread still reports
/// to the same dependency graph.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(initial: T) -> Self {
        Self::new_in(ReactiveRuntime::current(), initial)
    }

    /// Create a new signal bound to a specific runtime.
    pub fn new_in(runtime: Arc<ReactiveRuntime>, initial: T) -> Self {
        let id = runtime.next_id();
        Self {
            inner: Arc::new(SignalInner {
                value: RwLock::new(initial),
                id,
                runtime,
            }),
        }
    }

    /// Get the current value of the signal.
    pub fn get(&self) -> T {
        self.inner.runtime.track_read(self.inner.id);
        self.inner.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value for the signal.
    pub fn set(&self, new_value: T) {
        *self.inner.value.write() = new_value;
        self.inner.runtime.notify_observers(self.inner.id);
    }

    /// Update the value using a function.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut value = self.inner.value.write();
            f(&mut *value)
        };
        self.inner.runtime.notify_observers(self.inner.id);
        result
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.runtime.track_read(self.inner.id);
        let value = self.inner.value.read();
        f(&*value)
    }

    /// Read the value with a function, without cloning or tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.inner.value.read();
        f(&*value)
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> usize {
        self.inner.id
    }
}
