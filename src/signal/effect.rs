use crate::runtime::ReactiveRuntime;
use std::sync::{Arc, Weak};

/// A side effect that runs when its dependencies change.
///
/// Effects automatically track signal and memo reads and re-run when those
/// change. The effect runs immediately on creation to establish its initial
/// dependencies; every re-run tracks afresh. Dropping the effect stops it.
///
/// # Examples
///
/// ```
/// use tincan_accessor::{Effect, Signal};
/// use std::sync::{Arc, atomic::{AtomicI32, Ordering}};
///
/// let signal = Signal::new(5);
/// let last_value = Arc::new(AtomicI32::new(0));
/// let last_value_clone = last_value.clone();
///
/// let _effect = Effect::new({
///     let signal = signal.clone();
///     move || {
///         last_value_clone.store(signal.get(), Ordering::SeqCst);
///     }
/// });
///
/// assert_eq!(last_value.load(Ordering::SeqCst), 5);
///
/// signal.set(10);
/// assert_eq!(last_value.load(Ordering::SeqCst), 10);
/// ```
pub struct Effect {
    id: usize,
    run: Arc<dyn Fn() + Send + Sync>,
    runtime: Weak<ReactiveRuntime>,
}

impl Effect {
    /// Create a new effect that runs when dependencies change.
    pub fn new<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();
        let effect: Arc<dyn Fn() + Send + Sync> = Arc::new(effect);

        let weak = Arc::downgrade(&runtime);
        let effect_clone = Arc::clone(&effect);
        runtime.create_observer(id, move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.clear_dependencies(id);
                runtime.with_observer(id, || effect_clone());
            }
        });

        // Run immediately within the observer context to track dependencies
        runtime.with_observer(id, || effect());

        Self {
            id,
            run: effect,
            runtime: Arc::downgrade(&runtime),
        }
    }

    /// Manually trigger the effect without re-tracking.
    pub fn run(&self) {
        (self.run)();
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_observer(self.id);
        }
    }
}

/// Create a new effect that runs when dependencies change.
///
/// The effect runs immediately and then again whenever any signal
/// it reads changes. Keep the returned handle alive for as long as the
/// effect should keep running.
pub fn create_effect<F>(effect: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn effect_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let _effect = create_effect(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_reruns_and_stops_on_drop() {
        ReactiveRuntime::scope(|| {
            let signal = Signal::new(0);
            let counter = Arc::new(AtomicUsize::new(0));

            let effect = Effect::new({
                let signal = signal.clone();
                let counter = counter.clone();
                move || {
                    let _ = signal.get();
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            signal.set(1);
            signal.set(2);
            assert_eq!(counter.load(Ordering::SeqCst), 3);

            drop(effect);
            signal.set(3);
            assert_eq!(counter.load(Ordering::SeqCst), 3);
        });
    }
}
