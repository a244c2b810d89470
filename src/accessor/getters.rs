use crate::accessor::tree::GetterTree;
use crate::accessor::view::{make_view, View, ViewTarget};
use crate::error::{AccessorError, Result, Scope};
use crate::runtime::ReactiveRuntime;
use crate::signal::Memo;
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(0);

// Getters being evaluated on this thread, innermost last
thread_local! {
    static EVALUATING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct GetterSlot {
    token: usize,
    memo: Memo<Result<Value>>,
}

/// Every getter of an accessor, each backed by a memo.
pub(crate) struct GetterTable {
    slots: IndexMap<String, GetterSlot>,
    runtime: Arc<ReactiveRuntime>,
}

impl GetterTable {
    /// Build one memo per getter.
    ///
    /// Each evaluator receives the read-only state view and a read-only view
    /// over this same table, so getters can depend on each other.
    pub(crate) fn build(
        runtime: &Arc<ReactiveRuntime>,
        tree: &GetterTree,
        state: &View,
    ) -> Arc<Self> {
        Arc::new_cyclic(|table: &Weak<GetterTable>| {
            let getters = make_view(Arc::new(GetterLink(table.clone())), tree.keys(), false);

            let slots = tree
                .iter()
                .map(|(key, getter)| {
                    let getter = Arc::clone(getter);
                    let state = state.clone();
                    let getters = getters.clone();
                    let name = key.clone();
                    let memo = Memo::new_in(Arc::clone(runtime), move || {
                        trace!(getter = %name, "evaluating getter");
                        getter(&state, &getters)
                    });
                    let slot = GetterSlot {
                        token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
                        memo,
                    };
                    (key.clone(), slot)
                })
                .collect();

            GetterTable {
                slots,
                runtime: Arc::clone(runtime),
            }
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Current value of getter `key`, recomputed only if an input changed.
    pub(crate) fn evaluate(&self, key: &str) -> Result<Value> {
        let slot = self.slots.get(key).ok_or_else(|| AccessorError::UnknownKey {
            key: key.to_string(),
            scope: Scope::GetterView,
        })?;

        let cyclic = EVALUATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&slot.token) {
                true
            } else {
                stack.push(slot.token);
                false
            }
        });
        if cyclic {
            // The caller still depends on this getter, so its cached failure
            // clears once the cycle is broken
            self.runtime.track_read(slot.memo.id());
            return Err(AccessorError::CyclicGetter {
                key: key.to_string(),
            });
        }

        let _pop = PopOnDrop;
        slot.memo.get()
    }
}

struct PopOnDrop;

impl Drop for PopOnDrop {
    fn drop(&mut self) {
        EVALUATING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The getter view's target. Weak so the memos do not keep their own table
/// alive.
struct GetterLink(Weak<GetterTable>);

impl ViewTarget for GetterLink {
    fn scope(&self) -> Scope {
        Scope::GetterView
    }

    fn read(&self, key: &str) -> Result<Value> {
        match self.0.upgrade() {
            Some(table) => table.evaluate(key),
            None => Err(AccessorError::UnknownKey {
                key: key.to_string(),
                scope: Scope::GetterView,
            }),
        }
    }
}

impl ViewTarget for GetterTable {
    fn scope(&self) -> Scope {
        Scope::GetterView
    }

    fn read(&self, key: &str) -> Result<Value> {
        self.evaluate(key)
    }
}
