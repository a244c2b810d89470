use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use std::sync::Arc;

struct MemoInner<T> {
    compute: Box<dyn Fn() -> T + Send + Sync>,
    cached: RwLock<Option<T>>,
    id: usize,
    runtime: Arc<ReactiveRuntime>,
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        self.runtime.remove_observer(self.id);
        self.runtime.remove_source(self.id);
    }
}

/// A memoized computed value that automatically tracks dependencies.
///
/// Memos are lazy: nothing runs until the first read, and a write to a
/// dependency only marks the memo dirty. The next read recomputes and
/// re-tracks, so a read never observes a value older than its inputs.
pub struct Memo<T> {
    inner: Arc<MemoInner<T>>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new_in(ReactiveRuntime::current(), compute)
    }

    /// Create a new memo bound to a specific runtime.
    pub fn new_in<F>(runtime: Arc<ReactiveRuntime>, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = runtime.next_id();

        // Register this as a memo with the runtime
        runtime.register_memo(id);

        Self {
            inner: Arc::new(MemoInner {
                compute: Box::new(compute),
                cached: RwLock::new(None),
                id,
                runtime,
            }),
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        self.inner.runtime.track_read(self.inner.id);

        if !self.inner.runtime.take_memo_dirty(self.inner.id) {
            if let Some(value) = self.inner.cached.read().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.runtime.is_memo_dirty(self.inner.id)
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    fn recompute(&self) -> T {
        let runtime = &self.inner.runtime;
        runtime.clear_dependencies(self.inner.id);
        let value = runtime.with_observer(self.inner.id, || (self.inner.compute)());
        *self.inner.cached.write() = Some(value.clone());
        value
    }
}

/// Create a new memoized computation.
///
/// # Example
///
/// ```
/// use tincan_accessor::{create_memo, Signal};
///
/// let count = Signal::new(5);
/// let doubled = create_memo({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Memo::new(compute)
}
