use crate::accessor::bound::{BoundAction, BoundMutation, MutationTable};
use crate::accessor::getters::GetterTable;
use crate::accessor::payload::Payload;
use crate::accessor::state::{json_kind, ReactiveState};
use crate::accessor::tree::{ActionFuture, ActionTree, GetterTree, MutationTree};
use crate::accessor::view::{make_view, View};
use crate::error::{AccessorError, Result, Scope, TreeKind};
use crate::runtime::ReactiveRuntime;
use crate::signal::Signal;
use crate::store::Store;
use futures::future::{self, FutureExt};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type StateFactory = Box<dyn Fn() -> Result<Value> + Send + Sync>;

/// What to do when the same key is defined in more than one tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Fail construction with [`AccessorError::DuplicateKey`].
    #[default]
    Reject,
    /// The later tree wins on the accessor, in the order state, getters,
    /// mutations, actions. Shadowed members stay reachable through their
    /// own views.
    LastWins,
}

/// Everything [`make_accessor`] needs.
///
/// ```
/// use serde_json::json;
/// use tincan_accessor::{make_accessor, AccessorConfig, GetterTree, MutationTree};
///
/// let counter = make_accessor(
///     AccessorConfig::new(|| json!({ "count": 0 }))
///         .getters(GetterTree::new().getter("double", |state, _| {
///             Ok(json!(state.get_as::<i64>("count")? * 2))
///         }))
///         .mutations(MutationTree::new().mutation("increment", |state, _| {
///             state.update_as("count", |count: &mut i64| *count += 1)
///         })),
/// )
/// .unwrap();
///
/// counter.commit("increment", ()).unwrap();
/// assert_eq!(counter.get("double").unwrap(), json!(2));
/// ```
pub struct AccessorConfig {
    state: StateFactory,
    getters: GetterTree,
    mutations: MutationTree,
    actions: ActionTree,
    collision_policy: CollisionPolicy,
    runtime: Option<Arc<ReactiveRuntime>>,
}

impl AccessorConfig {
    /// Start from a state factory returning a JSON object.
    pub fn new<F>(state: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::from_factory(Box::new(move || Ok(state())))
    }

    /// Start from a state factory returning any serializable record.
    pub fn typed<S, F>(state: F) -> Self
    where
        S: Serialize,
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self::from_factory(Box::new(move || {
            serde_json::to_value(state()).map_err(|err| AccessorError::serialization("state", err))
        }))
    }

    fn from_factory(state: StateFactory) -> Self {
        Self {
            state,
            getters: GetterTree::default(),
            mutations: MutationTree::default(),
            actions: ActionTree::default(),
            collision_policy: CollisionPolicy::default(),
            runtime: None,
        }
    }

    pub fn getters(mut self, getters: GetterTree) -> Self {
        self.getters = getters;
        self
    }

    pub fn mutations(mut self, mutations: MutationTree) -> Self {
        self.mutations = mutations;
        self
    }

    pub fn actions(mut self, actions: ActionTree) -> Self {
        self.actions = actions;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Track the accessor in this runtime instead of the current one.
    pub fn runtime(mut self, runtime: Arc<ReactiveRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl fmt::Debug for AccessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorConfig")
            .field("getters", &self.getters)
            .field("mutations", &self.mutations)
            .field("actions", &self.actions)
            .field("collision_policy", &self.collision_policy)
            .finish_non_exhaustive()
    }
}

/// One entry of the accessor's surface.
enum Member {
    Field(Signal<Value>),
    Getter,
    Mutation(BoundMutation),
    Action(BoundAction),
}

impl Member {
    fn kind(&self) -> TreeKind {
        match self {
            Member::Field(_) => TreeKind::State,
            Member::Getter => TreeKind::Getter,
            Member::Mutation(_) => TreeKind::Mutation,
            Member::Action(_) => TreeKind::Action,
        }
    }
}

struct AccessorInner {
    members: IndexMap<String, Member>,
    state: Arc<ReactiveState>,
    getters: Arc<GetterTable>,
    store: Store,
    runtime: Arc<ReactiveRuntime>,
}

/// The object built by [`make_accessor`].
///
/// State fields read and write like properties, getters read like
/// properties, and mutations and actions are called with their payload only.
/// Cloning an accessor yields another handle to the same state.
#[derive(Clone)]
pub struct Accessor {
    inner: Arc<AccessorInner>,
}

/// Build an accessor from a state factory and its getter, mutation and
/// action trees.
///
/// The state factory is called exactly once. Each state field becomes its
/// own signal, each getter a memo over the read-only state and getter views,
/// each mutation a closure over the writable state view, and each action a
/// closure over a [`Store`].
pub fn make_accessor(config: AccessorConfig) -> Result<Accessor> {
    let AccessorConfig {
        state,
        getters,
        mutations,
        actions,
        collision_policy,
        runtime,
    } = config;

    let record = match state()? {
        Value::Object(record) => record,
        other => {
            return Err(AccessorError::StateNotRecord {
                found: json_kind(&other),
            })
        }
    };

    let owners = resolve_keys(
        collision_policy,
        [
            (TreeKind::State, record.keys().cloned().collect::<Vec<_>>()),
            (TreeKind::Getter, getters.keys().cloned().collect()),
            (TreeKind::Mutation, mutations.keys().cloned().collect()),
            (TreeKind::Action, actions.keys().cloned().collect()),
        ],
    )?;

    let runtime = runtime.unwrap_or_else(ReactiveRuntime::current);
    let raw = Arc::new(ReactiveState::new(&runtime, record));
    let state_keys: Vec<String> = raw.keys().cloned().collect();

    let writable_state = make_view(raw.clone(), &state_keys, true);
    let state_view = writable_state.read_only();

    let mutation_table = Arc::new(MutationTable::bind(&mutations, &writable_state, &runtime));
    let mutation_view = make_view(mutation_table.clone(), mutations.keys(), true);

    let getter_table = GetterTable::build(&runtime, &getters, &state_view);
    let getter_view = make_view(getter_table.clone(), getters.keys(), false);

    let store = Store::new(state_view, getter_view, mutation_view);

    let members = owners
        .into_iter()
        .map(|(key, kind)| -> Result<(String, Member)> {
            let member = match kind {
                TreeKind::State => Member::Field(field_of(&raw, &key)?),
                TreeKind::Getter => Member::Getter,
                TreeKind::Mutation => Member::Mutation(
                    mutation_table
                        .get(&key)
                        .cloned()
                        .ok_or_else(|| unknown(&key))?,
                ),
                TreeKind::Action => {
                    let action = actions.get(&key).ok_or_else(|| unknown(&key))?;
                    Member::Action(BoundAction::bind(
                        &key,
                        Arc::clone(action),
                        store.clone(),
                        Arc::clone(&runtime),
                    ))
                }
            };
            Ok((key, member))
        })
        .collect::<Result<IndexMap<_, _>>>()?;

    debug!(
        fields = raw.len(),
        getters = getter_table.len(),
        mutations = mutation_table.len(),
        actions = actions.len(),
        "built accessor"
    );

    Ok(Accessor {
        inner: Arc::new(AccessorInner {
            members,
            state: raw,
            getters: getter_table,
            store,
            runtime,
        }),
    })
}

/// Decide which tree owns each key on the accessor surface.
fn resolve_keys<const N: usize>(
    policy: CollisionPolicy,
    trees: [(TreeKind, Vec<String>); N],
) -> Result<IndexMap<String, TreeKind>> {
    let mut owners: IndexMap<String, TreeKind> = IndexMap::new();
    for (kind, keys) in trees {
        for key in keys {
            if let Some(&first) = owners.get(&key) {
                match policy {
                    CollisionPolicy::Reject => {
                        return Err(AccessorError::DuplicateKey {
                            key,
                            first,
                            second: kind,
                        })
                    }
                    CollisionPolicy::LastWins => {
                        warn!(key = %key, shadowed = %first, by = %kind, "accessor key shadowed");
                    }
                }
            }
            owners.insert(key, kind);
        }
    }
    Ok(owners)
}

fn field_of(state: &ReactiveState, key: &str) -> Result<Signal<Value>> {
    state.field(key).cloned().ok_or_else(|| unknown(key))
}

fn unknown(key: &str) -> AccessorError {
    AccessorError::UnknownKey {
        key: key.to_string(),
        scope: Scope::Accessor,
    }
}

impl Accessor {
    fn member(&self, key: &str) -> Result<&Member> {
        self.inner.members.get(key).ok_or_else(|| unknown(key))
    }

    /// Read a state field or getter.
    ///
    /// Inside an effect or getter the read is tracked like any signal read.
    pub fn get(&self, key: &str) -> Result<Value> {
        match self.member(key)? {
            Member::Field(signal) => Ok(signal.get()),
            Member::Getter => self.inner.getters.evaluate(key),
            other => Err(AccessorError::WrongKind {
                key: key.to_string(),
                expected: TreeKind::State,
                found: other.kind(),
            }),
        }
    }

    /// Read a state field or getter and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|err| AccessorError::serialization(key, err))
    }

    /// Assign a state field directly. Getters are read-only.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        match self.member(key)? {
            Member::Field(signal) => {
                signal.set(value);
                Ok(())
            }
            Member::Getter => Err(AccessorError::ReadOnly {
                key: key.to_string(),
                scope: Scope::Accessor,
            }),
            other => Err(AccessorError::WrongKind {
                key: key.to_string(),
                expected: TreeKind::State,
                found: other.kind(),
            }),
        }
    }

    /// Serialize `value` and assign it to a state field.
    pub fn set_to<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| AccessorError::serialization(key, err))?;
        self.set(key, value)
    }

    /// Run mutation `name` with `payload`.
    pub fn commit(&self, name: &str, payload: impl Into<Payload>) -> Result<()> {
        match self.member(name)? {
            Member::Mutation(mutation) => mutation.call(payload),
            other => Err(AccessorError::WrongKind {
                key: name.to_string(),
                expected: TreeKind::Mutation,
                found: other.kind(),
            }),
        }
    }

    /// Start action `name` with `payload`.
    ///
    /// Lookup failures are reported through the returned future so every
    /// dispatch is awaited the same way.
    pub fn dispatch(&self, name: &str, payload: impl Into<Payload>) -> ActionFuture {
        match self.member(name) {
            Ok(Member::Action(action)) => action.call(payload),
            Ok(other) => future::ready(Err(AccessorError::WrongKind {
                key: name.to_string(),
                expected: TreeKind::Action,
                found: other.kind(),
            }))
            .boxed(),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    /// The bound mutation `name`, callable with a payload only.
    pub fn mutation(&self, name: &str) -> Option<BoundMutation> {
        match self.inner.members.get(name)? {
            Member::Mutation(mutation) => Some(mutation.clone()),
            _ => None,
        }
    }

    /// The bound action `name`, callable with a payload only.
    pub fn action(&self, name: &str) -> Option<BoundAction> {
        match self.inner.members.get(name)? {
            Member::Action(action) => Some(action.clone()),
            _ => None,
        }
    }

    /// Which tree `key` comes from on this accessor.
    pub fn kind_of(&self, key: &str) -> Option<TreeKind> {
        self.inner.members.get(key).map(Member::kind)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.members.contains_key(key)
    }

    /// Every key on the accessor: state fields, getters, mutations, actions.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.members.keys().map(String::as_str)
    }

    /// Read-only view over the state fields.
    pub fn state_view(&self) -> View {
        self.inner.store.state.clone()
    }

    /// Read-only view over the getters.
    pub fn getter_view(&self) -> View {
        self.inner.store.getters.clone()
    }

    /// The store the accessor's actions receive.
    pub fn store(&self) -> Store {
        self.inner.store.clone()
    }

    /// The runtime this accessor's fields and getters are tracked in.
    pub fn runtime(&self) -> Arc<ReactiveRuntime> {
        Arc::clone(&self.inner.runtime)
    }

    pub(crate) fn raw_state(&self) -> &ReactiveState {
        &self.inner.state
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, member) in &self.inner.members {
            match member {
                Member::Field(signal) => map.entry(key, &signal.get_untracked()),
                other => map.entry(key, &other.kind()),
            };
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> AccessorConfig {
        AccessorConfig::new(|| json!({ "count": 0, "label": "clicks" }))
            .getters(GetterTree::new().getter("double", |state, _| {
                Ok(json!(state.get_as::<i64>("count")? * 2))
            }))
            .mutations(
                MutationTree::new()
                    .mutation("increment", |state, _| {
                        state.update_as("count", |count: &mut i64| *count += 1)
                    })
                    .mutation("add", |state, payload| {
                        let amount: i64 = payload.arg(0)?;
                        state.update_as("count", |count: &mut i64| *count += amount)
                    }),
            )
            .actions(ActionTree::new().action_sync("increment_twice", |store, _| {
                store.commit("increment", ())?;
                store.commit("increment", ())?;
                Ok(Value::Null)
            }))
    }

    #[test]
    fn keys_follow_tree_order() {
        let accessor = make_accessor(counter()).unwrap();
        assert_eq!(
            accessor.keys().collect::<Vec<_>>(),
            vec!["count", "label", "double", "increment", "add", "increment_twice"]
        );
        assert_eq!(accessor.kind_of("double"), Some(TreeKind::Getter));
        assert_eq!(accessor.kind_of("missing"), None);
    }

    #[test]
    fn state_fields_are_settable_and_getters_are_not() {
        let accessor = make_accessor(counter()).unwrap();
        accessor.set("count", json!(21)).unwrap();
        assert_eq!(accessor.get("double").unwrap(), json!(42));

        assert_eq!(
            accessor.set("double", json!(1)),
            Err(AccessorError::ReadOnly {
                key: "double".into(),
                scope: Scope::Accessor
            })
        );
    }

    #[test]
    fn commit_rejects_non_mutations() {
        let accessor = make_accessor(counter()).unwrap();
        assert_eq!(
            accessor.commit("double", ()),
            Err(AccessorError::WrongKind {
                key: "double".into(),
                expected: TreeKind::Mutation,
                found: TreeKind::Getter
            })
        );
        assert!(matches!(
            accessor.commit("nope", ()),
            Err(AccessorError::UnknownKey { .. })
        ));
        assert!(matches!(
            accessor.get("increment"),
            Err(AccessorError::WrongKind { .. })
        ));
    }

    #[test]
    fn bound_callables_omit_first_argument() {
        let accessor = make_accessor(counter()).unwrap();
        let add = accessor.mutation("add").unwrap();
        add.call(json!(5)).unwrap();
        assert_eq!(add.name(), "add");
        assert_eq!(accessor.get_as::<i64>("count").unwrap(), 5);

        assert!(accessor.mutation("increment_twice").is_none());
        let action = accessor.action("increment_twice").unwrap();
        futures::executor::block_on(action.call(())).unwrap();
        assert_eq!(accessor.get_as::<i64>("count").unwrap(), 7);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let config = counter().getters(GetterTree::new().getter("count", |_, _| Ok(json!(0))));
        assert_eq!(
            make_accessor(config).unwrap_err(),
            AccessorError::DuplicateKey {
                key: "count".into(),
                first: TreeKind::State,
                second: TreeKind::Getter
            }
        );

        let config = counter().actions(ActionTree::new().action_sync("add", |_, _| Ok(json!(0))));
        assert!(matches!(
            make_accessor(config),
            Err(AccessorError::DuplicateKey {
                first: TreeKind::Mutation,
                second: TreeKind::Action,
                ..
            })
        ));
    }

    #[test]
    fn last_wins_shadows_on_accessor_only() {
        let config = counter()
            .getters(GetterTree::new().getter("label", |state, _| {
                Ok(json!(format!("{} clicks", state.get_as::<i64>("count")?)))
            }))
            .collision_policy(CollisionPolicy::LastWins);
        let accessor = make_accessor(config).unwrap();

        assert_eq!(accessor.kind_of("label"), Some(TreeKind::Getter));
        assert_eq!(accessor.get("label").unwrap(), json!("0 clicks"));
        assert_eq!(accessor.state_view().get("label").unwrap(), json!("clicks"));
    }

    #[test]
    fn state_factory_must_return_object() {
        let err = make_accessor(AccessorConfig::new(|| json!([1, 2]))).unwrap_err();
        assert_eq!(err, AccessorError::StateNotRecord { found: "an array" });
    }

    #[test]
    fn typed_state_factory() {
        #[derive(Serialize)]
        struct Counter {
            count: u32,
        }

        let accessor = make_accessor(AccessorConfig::typed(|| Counter { count: 3 })).unwrap();
        assert_eq!(accessor.get_as::<u32>("count").unwrap(), 3);
    }

    #[test]
    fn state_factory_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let accessor = make_accessor(AccessorConfig::new({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                json!({ "count": 0 })
            }
        }))
        .unwrap();

        let _clone = accessor.clone();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
