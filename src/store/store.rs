use super::action::{erase, ActionFn, Actions, Continuation, Dispatch, Transition};
use crate::bus::{Event, ListenerId, Propagation};
use crate::devtools::DevtoolsHandle;
use crate::error::{Result, StoreError};
use crate::frozen::Frozen;
use crate::runtime::Registry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Event published after every genuine state change.
pub const CHANGED: &str = "changed";

/// Action name used for changes made through [`Store::set_state`] without an
/// explicit action.
pub const SET_STATE: &str = "setState";

/// Full channel name for `event` on the store called `store`.
///
/// Event names that already contain a `:` are taken to be fully qualified
/// and pass through untouched, so `"global:data-loaded"` can be reached from
/// any store.
pub fn channel_name(store: &str, event: &str) -> String {
    if event.contains(':') {
        event.to_string()
    } else {
        format!("{store}-store:{event}")
    }
}

/// Whether a store may tear down the registry it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// A general-purpose store. [`Store::reset`] is allowed.
    #[default]
    Root,
    /// A store built for one domain. [`Store::reset`] is refused so a narrow
    /// component cannot wipe state it does not own.
    Specialized,
}

/// A named, action-driven state container.
///
/// The state itself lives in the [`Registry`] under the store's name;
/// a `Store` is a handle carrying that name plus its own table of
/// transition functions. Clones share the table.
///
/// State only changes through [`dispatch`](Store::dispatch),
/// [`set_state`](Store::set_state) and [`previous`](Store::previous). Each
/// change that produces a different snapshot publishes a `changed` event
/// carrying the new snapshot and the name of the action responsible.
///
/// # Examples
///
/// ```
/// use glassbil::{Registry, Store};
/// use serde_json::json;
///
/// let store = Store::builder().registry(Registry::new()).name("counter").build();
/// store.register("incremented", |state, _payload, _next| {
///     json!(state.as_i64().unwrap_or(0) + 1)
/// });
///
/// store.dispatch("incremented", json!(null)).unwrap();
/// store.dispatch("incremented", json!(null)).unwrap();
/// assert_eq!(store.data().as_i64(), Some(2));
/// ```
#[derive(Clone)]
pub struct Store {
    name: Arc<str>,
    kind: StoreKind,
    registry: Arc<Registry>,
    actions: Arc<RwLock<HashMap<String, ActionFn>>>,
    pub(crate) inspector: Arc<OnceLock<DevtoolsHandle>>,
}

impl Store {
    /// Attach to the store called `name` in the current registry.
    pub fn new(name: &str) -> Self {
        Self::builder().name(name).build()
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Register one transition, replacing any previous one of the same name.
    pub fn register<F, T>(&self, name: &str, transition: F) -> &Self
    where
        F: Fn(&Frozen, Value, Continuation) -> T + Send + Sync + 'static,
        T: Into<Transition>,
    {
        self.write_actions()
            .insert(name.to_string(), erase(transition));
        self
    }

    /// Register a whole set of transitions.
    pub fn extend(&self, actions: Actions) -> &Self {
        self.write_actions().extend(actions.into_definitions());
        self
    }

    /// Names of the registered actions, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn write_actions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ActionFn>> {
        self.actions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the action called `action` against the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAction`] if no such action is registered.
    pub fn dispatch(&self, action: &str, payload: Value) -> Result<Dispatch> {
        let transition = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAction {
                store: self.name.to_string(),
                action: action.to_string(),
            })?;

        tracing::debug!(store = %self.name, action, "dispatching action");

        let current = self.data();
        let next = Continuation::new(self.clone(), action);
        match transition(&current, payload, next) {
            Transition::Commit(state) => Ok(Dispatch::Applied {
                changed: self.set_state(state, Some(action)),
            }),
            Transition::Pending => Ok(Dispatch::Pending),
        }
    }

    /// Commit `state` directly. Returns whether the snapshot changed.
    ///
    /// A state equal to the current snapshot marks the store loaded but
    /// publishes nothing and records no history.
    pub fn set_state(&self, state: impl Into<Frozen>, action: Option<&str>) -> bool {
        self.registry.commit(&self.name, state.into(), action)
    }

    /// The current snapshot. A store that has never been written to holds
    /// an empty array.
    pub fn data(&self) -> Frozen {
        self.registry
            .snapshot(&self.name)
            .unwrap_or_else(Frozen::empty)
    }

    /// Whether at least one transition has been committed.
    pub fn is_loaded(&self) -> bool {
        self.registry.is_loaded(&self.name)
    }

    pub fn history_len(&self) -> usize {
        self.registry.history_len(&self.name)
    }

    /// Roll back to the previous snapshot and announce it as a change.
    ///
    /// Returns `false`, doing nothing, when the history is empty.
    pub fn previous(&self) -> bool {
        self.registry.rollback(&self.name)
    }

    pub fn channel(&self, event: &str) -> String {
        channel_name(&self.name, event)
    }

    /// Listen for `event` on this store (see [`channel_name`]).
    pub fn on<F, R>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        self.registry.bus().subscribe(&self.channel(event), listener)
    }

    /// Listen for the next `event` only.
    pub fn one<F, R>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        self.registry
            .bus()
            .subscribe_once(&self.channel(event), listener)
    }

    pub fn off(&self, event: &str, listener: ListenerId) -> bool {
        self.registry.bus().unsubscribe(&self.channel(event), listener)
    }

    /// Remove every listener for `event`.
    pub fn off_all(&self, event: &str) {
        self.registry.bus().unsubscribe_all(&self.channel(event));
    }

    pub fn trigger(&self, event: &str, payload: impl Into<Frozen>, action: Option<&str>) {
        self.registry
            .bus()
            .publish(&self.channel(event), payload.into(), action);
    }

    /// Wipe every store and listener in the registry.
    ///
    /// Only [`StoreKind::Root`] stores may do this; specialized stores get
    /// `false` back and nothing happens.
    pub fn reset(&self) -> bool {
        if self.kind != StoreKind::Root {
            tracing::debug!(store = %self.name, "reset refused for specialized store");
            return false;
        }
        self.registry.reset();
        true
    }
}

/// Builder for [`Store`].
///
/// Without a name the registry assigns a unique one; without a registry the
/// [current](Registry::current) one is used.
#[derive(Default)]
pub struct StoreBuilder {
    name: Option<String>,
    kind: StoreKind,
    registry: Option<Arc<Registry>>,
    actions: Actions,
}

impl StoreBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn actions(mut self, actions: Actions) -> Self {
        self.actions = actions;
        self
    }

    /// Build a [`StoreKind::Specialized`] store.
    pub fn specialized(mut self) -> Self {
        self.kind = StoreKind::Specialized;
        self
    }

    /// Attach to (or create) the named entry. An existing entry keeps its
    /// snapshot and history.
    pub fn build(self) -> Store {
        let registry = self.registry.unwrap_or_else(Registry::current);
        let name = registry.attach(self.name.as_deref());
        let store = Store {
            name: Arc::from(name),
            kind: self.kind,
            registry,
            actions: Arc::new(RwLock::new(HashMap::new())),
            inspector: Arc::new(OnceLock::new()),
        };
        store.extend(self.actions);
        store
    }
}
