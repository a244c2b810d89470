use indexmap::IndexSet;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Reactive context for tracking dependencies.
struct ReactiveContext {
    // Observer currently evaluating on each thread
    current_observer: HashMap<ThreadId, usize>,
    // Map from source ID (signal or memo) to the observers that read it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to the sources it read
    observer_deps: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to the effect function
    observers: HashMap<usize, Observer>,
    // Map from memo ID to dirty state
    memo_dirty: HashMap<usize, bool>,
    // Effects held back by an open batch on each thread
    batches: HashMap<ThreadId, IndexSet<usize>>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            current_observer: HashMap::new(),
            dependencies: HashMap::new(),
            observer_deps: HashMap::new(),
            observers: HashMap::new(),
            memo_dirty: HashMap::new(),
            batches: HashMap::new(),
        }
    }

    fn clear(&mut self) {
        self.current_observer.clear();
        self.dependencies.clear();
        self.observer_deps.clear();
        self.observers.clear();
        self.memo_dirty.clear();
        self.batches.clear();
    }

    fn clear_dependencies(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                }
            }
        }
    }

    /// Mark everything downstream of `source_id` stale.
    ///
    /// Memos are flagged dirty (and their own dependents visited); the ids of
    /// dependent effects are returned so the caller can run them once the lock
    /// is released.
    fn collect_stale(&mut self, source_id: usize) -> IndexSet<usize> {
        let mut pending = vec![source_id];
        let mut effects = IndexSet::new();

        while let Some(id) = pending.pop() {
            let Some(dependents) = self.dependencies.get(&id) else {
                continue;
            };
            for &observer_id in dependents {
                match self.memo_dirty.get_mut(&observer_id) {
                    Some(dirty) => {
                        if !*dirty {
                            *dirty = true;
                            pending.push(observer_id);
                        }
                    }
                    None => {
                        effects.insert(observer_id);
                    }
                }
            }
        }

        effects
    }

    fn resolve(&self, ids: IndexSet<usize>) -> Vec<Observer> {
        ids.into_iter()
            .filter_map(|id| self.observers.get(&id).cloned())
            .collect()
    }
}

/// Hybrid reactive runtime for managing reactive primitives.
///
/// Supports both global runtime (default) and scoped runtimes for isolation.
/// The runtime tracks dependencies between signals, effects, and memos,
/// and manages the reactive graph.
///
/// # Examples
///
/// Using the default global runtime:
///
/// ```
/// use tincan_accessor::Signal;
///
/// let signal = Signal::new(42);
/// assert_eq!(signal.get(), 42);
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use tincan_accessor::runtime::ReactiveRuntime;
/// use tincan_accessor::Signal;
///
/// ReactiveRuntime::scope(|| {
///     let signal = Signal::new(0);
///     assert_eq!(signal.get(), 0);
/// });
/// // Runtime and all its state is dropped here
/// ```
pub struct ReactiveRuntime {
    next_id: AtomicUsize,
    context: Mutex<ReactiveContext>,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
}

impl ReactiveRuntime {
    /// Create a new isolated runtime.
    ///
    /// This creates a completely independent reactive runtime with its own
    /// dependency graph. Useful for testing or creating isolated contexts.
    pub fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            next_id: AtomicUsize::new(0),
            context: Mutex::new(ReactiveContext::new()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is automatically cleaned up when
    /// the function returns, unless a primitive created inside still holds it.
    ///
    /// # Examples
    ///
    /// ```
    /// use tincan_accessor::runtime::ReactiveRuntime;
    /// use tincan_accessor::Signal;
    ///
    /// ReactiveRuntime::scope(|| {
    ///     let signal = Signal::new(0);
    ///     assert_eq!(signal.get(), 0);
    /// });
    /// ```
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// Get or create the global runtime (fallback).
    ///
    /// This is used as the default runtime when no scoped runtime is active.
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current reactive runtime (scoped or global fallback).
    ///
    /// Returns the runtime from the top of the thread-local stack,
    /// or the global runtime if no scoped runtime is active.
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// This pushes the runtime onto the thread-local stack for the duration
    /// of the function execution.
    ///
    /// # Examples
    ///
    /// ```
    /// use tincan_accessor::runtime::ReactiveRuntime;
    /// use tincan_accessor::Signal;
    ///
    /// let runtime = ReactiveRuntime::new();
    /// ReactiveRuntime::with_runtime(runtime, || {
    ///     let signal = Signal::new(42);
    ///     assert_eq!(signal.get(), 42);
    /// });
    /// ```
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Clear all observers, dependencies, and state from this runtime.
    ///
    /// Useful for resetting between tests. Memos created before the reset
    /// recompute on their next read.
    ///
    /// # Examples
    ///
    /// ```
    /// use tincan_accessor::runtime::ReactiveRuntime;
    /// use tincan_accessor::Signal;
    ///
    /// let runtime = ReactiveRuntime::new();
    /// ReactiveRuntime::with_runtime(runtime.clone(), || {
    ///     let _signal = Signal::new(42);
    /// });
    ///
    /// runtime.clear(); // Clean up all state
    /// ```
    pub fn clear(&self) {
        // Observer closures may own primitives that unregister on drop
        let observers = {
            let mut ctx = self.context.lock();
            let observers = std::mem::take(&mut ctx.observers);
            ctx.clear();
            observers
        };
        drop(observers);
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Generate the next unique ID for a reactive primitive.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Track a read of a source by the observer running on this thread.
    pub fn track_read(&self, source_id: usize) {
        let mut ctx = self.context.lock();
        let Some(current_observer) = ctx.current_observer.get(&thread::current().id()).copied()
        else {
            return;
        };
        // A memo reading itself is a cycle; leave it to the caller to report
        if current_observer == source_id {
            return;
        }
        ctx.dependencies
            .entry(source_id)
            .or_default()
            .insert(current_observer);
        ctx.observer_deps
            .entry(current_observer)
            .or_default()
            .insert(source_id);
    }

    /// Notify everything that depends on a source.
    ///
    /// Dependent memos are marked dirty transitively; dependent effects are
    /// re-run after the runtime lock has been released, or when the enclosing
    /// [`batch`](Self::batch) ends.
    pub fn notify_observers(&self, source_id: usize) {
        let effects = {
            let mut ctx = self.context.lock();
            let stale = ctx.collect_stale(source_id);
            match ctx.batches.get_mut(&thread::current().id()) {
                Some(pending) => {
                    pending.extend(stale);
                    Vec::new()
                }
                None => ctx.resolve(stale),
            }
        };
        for effect in effects {
            effect();
        }
    }

    /// Run `f`, deferring effects triggered by its writes until it returns.
    ///
    /// Memos still go dirty immediately, so reads inside `f` are current.
    /// Each affected effect runs once at the end, after every write. Nested
    /// batches on the same thread fold into the outermost one.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use tincan_accessor::runtime::ReactiveRuntime;
    /// use tincan_accessor::{Effect, Signal};
    ///
    /// let runtime = ReactiveRuntime::new();
    /// let a = Signal::new_in(runtime.clone(), 1);
    /// let b = Signal::new_in(runtime.clone(), 2);
    /// let runs = Arc::new(AtomicUsize::new(0));
    /// let _effect = ReactiveRuntime::with_runtime(runtime.clone(), || {
    ///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
    ///     Effect::new(move || {
    ///         a.get();
    ///         b.get();
    ///         runs.fetch_add(1, Ordering::SeqCst);
    ///     })
    /// });
    ///
    /// runtime.batch(|| {
    ///     a.set(10);
    ///     b.set(20);
    /// });
    /// assert_eq!(runs.load(Ordering::SeqCst), 2);
    /// ```
    pub fn batch<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let thread_id = thread::current().id();
        let outermost = match self.context.lock().batches.entry(thread_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(IndexSet::new());
                true
            }
        };
        if !outermost {
            return f();
        }

        let guard = BatchGuard {
            runtime: self,
            thread_id,
        };
        let result = f();
        let effects = guard.finish();
        drop(guard);
        for effect in effects {
            effect();
        }
        result
    }

    /// Register an observer callback, dropping whatever it tracked before.
    pub fn create_observer<F>(&self, observer_id: usize, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let replaced = {
            let mut ctx = self.context.lock();
            ctx.clear_dependencies(observer_id);
            ctx.observers.insert(observer_id, Arc::new(f))
        };
        drop(replaced);
    }

    /// Remove an observer and all of its tracked dependencies.
    pub fn remove_observer(&self, observer_id: usize) {
        let removed = {
            let mut ctx = self.context.lock();
            ctx.memo_dirty.remove(&observer_id);
            ctx.clear_dependencies(observer_id);
            ctx.observers.remove(&observer_id)
        };
        drop(removed);
    }

    /// Forget a source that no longer exists.
    pub fn remove_source(&self, source_id: usize) {
        let mut ctx = self.context.lock();
        if let Some(observers) = ctx.dependencies.remove(&source_id) {
            for observer_id in observers {
                if let Some(deps) = ctx.observer_deps.get_mut(&observer_id) {
                    deps.remove(&source_id);
                }
            }
        }
    }

    /// Drop the dependencies an observer collected on its last run.
    pub fn clear_dependencies(&self, observer_id: usize) {
        self.context.lock().clear_dependencies(observer_id);
    }

    /// Run a function with a specific observer as the current context.
    ///
    /// The previous observer is restored even if `f` panics.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let thread_id = thread::current().id();
        let prev = self
            .context
            .lock()
            .current_observer
            .insert(thread_id, observer_id);

        let _restore = ObserverRestore {
            runtime: self,
            thread_id,
            prev,
        };
        f()
    }

    /// Run a function without an observer, so nothing it reads is tracked.
    pub fn untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let thread_id = thread::current().id();
        let prev = self.context.lock().current_observer.remove(&thread_id);

        let _restore = ObserverRestore {
            runtime: self,
            thread_id,
            prev,
        };
        f()
    }

    /// Register a memo and mark it as dirty initially.
    pub fn register_memo(&self, memo_id: usize) {
        self.context.lock().memo_dirty.insert(memo_id, true);
    }

    /// Check if a memo is dirty (needs recomputation).
    pub fn is_memo_dirty(&self, memo_id: usize) -> bool {
        self.context
            .lock()
            .memo_dirty
            .get(&memo_id)
            .copied()
            .unwrap_or(true)
    }

    /// Mark a memo as clean and report whether it was dirty.
    ///
    /// Clearing the flag before recomputing means a write that lands during
    /// the recomputation leaves the memo dirty again.
    pub fn take_memo_dirty(&self, memo_id: usize) -> bool {
        self.context
            .lock()
            .memo_dirty
            .insert(memo_id, false)
            .unwrap_or(true)
    }

    /// Number of observers currently depending on a source.
    pub fn dependent_count(&self, source_id: usize) -> usize {
        self.context
            .lock()
            .dependencies
            .get(&source_id)
            .map_or(0, HashSet::len)
    }
}

// Closes a batch; on unwind the pending effects are discarded
struct BatchGuard<'a> {
    runtime: &'a ReactiveRuntime,
    thread_id: ThreadId,
}

impl BatchGuard<'_> {
    fn finish(&self) -> Vec<Observer> {
        let mut ctx = self.runtime.context.lock();
        let pending = ctx.batches.remove(&self.thread_id).unwrap_or_default();
        ctx.resolve(pending)
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.runtime.context.lock().batches.remove(&self.thread_id);
    }
}

struct ObserverRestore<'a> {
    runtime: &'a ReactiveRuntime,
    thread_id: ThreadId,
    prev: Option<usize>,
}

impl Drop for ObserverRestore<'_> {
    fn drop(&mut self) {
        let mut ctx = self.runtime.context.lock();
        match self.prev {
            Some(prev) => {
                ctx.current_observer.insert(self.thread_id, prev);
            }
            None => {
                ctx.current_observer.remove(&self.thread_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn tracks_reads_inside_observer_only() {
        let runtime = ReactiveRuntime::new();
        let source = runtime.next_id();
        let observer = runtime.next_id();

        runtime.track_read(source);
        assert_eq!(runtime.dependent_count(source), 0);

        runtime.with_observer(observer, || runtime.track_read(source));
        assert_eq!(runtime.dependent_count(source), 1);

        runtime.untracked(|| runtime.track_read(runtime.next_id()));
        runtime.remove_observer(observer);
        assert_eq!(runtime.dependent_count(source), 0);
    }

    #[test]
    fn notify_marks_memos_dirty_transitively_and_runs_effects() {
        let runtime = ReactiveRuntime::new();
        let source = runtime.next_id();
        let memo = runtime.next_id();
        let effect = runtime.next_id();

        runtime.register_memo(memo);
        assert!(runtime.take_memo_dirty(memo));
        assert!(!runtime.is_memo_dirty(memo));

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        runtime.create_observer(effect, move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        runtime.with_observer(memo, || runtime.track_read(source));
        runtime.with_observer(effect, || runtime.track_read(memo));

        runtime.notify_observers(source);
        assert!(runtime.is_memo_dirty(memo));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn with_observer_restores_previous_observer() {
        let runtime = ReactiveRuntime::new();
        let source = runtime.next_id();
        let outer = runtime.next_id();
        let inner = runtime.next_id();

        runtime.with_observer(outer, || {
            runtime.with_observer(inner, || {});
            runtime.track_read(source);
        });

        let ctx = runtime.context.lock();
        assert!(ctx.dependencies[&source].contains(&outer));
        assert!(!ctx.dependencies[&source].contains(&inner));
        assert!(ctx.current_observer.is_empty());
    }

    #[test]
    fn batch_runs_each_effect_once_after_all_writes() {
        let runtime = ReactiveRuntime::new();
        let first = runtime.next_id();
        let second = runtime.next_id();
        let effect = runtime.next_id();

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        runtime.create_observer(effect, move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        runtime.with_observer(effect, || {
            runtime.track_read(first);
            runtime.track_read(second);
        });

        runtime.batch(|| {
            runtime.notify_observers(first);
            runtime.batch(|| runtime.notify_observers(second));
            assert_eq!(runs.load(Ordering::SeqCst), 0);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        runtime.notify_observers(first);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(runtime.context.lock().batches.is_empty());
    }
}
