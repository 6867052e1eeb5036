use super::store::Store;
use crate::frozen::Frozen;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub(crate) type ActionFn = Arc<dyn Fn(&Frozen, Value, Continuation) -> Transition + Send + Sync>;

/// How a transition function completed.
///
/// `Commit` hands the next state back immediately. `Pending` promises that
/// the [`Continuation`] passed to the transition will be committed later.
/// The engine never invents a state for a `Pending` transition whose
/// continuation is dropped.
#[derive(Debug, Clone)]
pub enum Transition {
    Commit(Frozen),
    Pending,
}

impl Transition {
    pub fn commit(state: impl Into<Frozen>) -> Self {
        Transition::Commit(state.into())
    }
}

impl From<Value> for Transition {
    fn from(state: Value) -> Self {
        Transition::Commit(Frozen::wrap(state))
    }
}

impl From<Frozen> for Transition {
    fn from(state: Frozen) -> Self {
        Transition::Commit(state)
    }
}

/// Outcome of [`Store::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The transition committed synchronously.
    Applied { changed: bool },
    /// The transition will commit through its continuation.
    Pending,
}

/// Deferred completion of one action.
///
/// Consumed by [`commit`](Continuation::commit), so a continuation can
/// complete its action at most once. It is `Send` and may be moved into a
/// thread or task that finishes the work.
///
/// # Examples
///
/// ```
/// use glassbil::{Registry, Store, Transition};
/// use serde_json::json;
///
/// let store = Store::builder().registry(Registry::new()).name("jobs").build();
/// let parked = std::sync::Arc::new(std::sync::Mutex::new(None));
/// let slot = parked.clone();
/// store.register("load", move |_state, _payload, next| {
///     *slot.lock().unwrap() = Some(next);
///     Transition::Pending
/// });
///
/// store.dispatch("load", json!(null)).unwrap();
/// assert!(!store.is_loaded());
///
/// let next = parked.lock().unwrap().take().unwrap();
/// next.commit(json!(["done"]));
/// assert_eq!(store.data(), json!(["done"]));
/// ```
pub struct Continuation {
    store: Store,
    action: String,
}

impl Continuation {
    pub(crate) fn new(store: Store, action: &str) -> Self {
        Self {
            store,
            action: action.to_string(),
        }
    }

    /// The action this continuation completes.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Commit the action's resulting state. Returns whether it changed.
    pub fn commit(self, state: impl Into<Frozen>) -> bool {
        self.store.set_state(state, Some(&self.action))
    }

    /// Commit under a different action name than the one dispatched.
    pub fn commit_as(self, state: impl Into<Frozen>, action: &str) -> bool {
        self.store.set_state(state, Some(action))
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("store", &self.store.name())
            .field("action", &self.action)
            .finish()
    }
}

/// A set of named transition functions, registered together.
///
/// Later definitions under the same name replace earlier ones.
///
/// # Examples
///
/// ```
/// use glassbil::{Actions, Registry, Store};
/// use serde_json::json;
///
/// let actions = Actions::new()
///     .with("added", |state, entry, _next| {
///         let mut todos = state.to_value();
///         todos.as_array_mut().unwrap().push(entry);
///         todos
///     })
///     .with("cleared", |_state, _payload, _next| json!([]));
///
/// let store = Store::builder()
///     .registry(Registry::new())
///     .name("todos")
///     .actions(actions)
///     .build();
/// assert_eq!(store.actions(), vec!["added".to_string(), "cleared".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct Actions {
    definitions: Vec<(String, ActionFn)>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transition. The closure may return a `Value`, a `Frozen`, or a
    /// [`Transition`].
    pub fn with<F, T>(mut self, name: &str, transition: F) -> Self
    where
        F: Fn(&Frozen, Value, Continuation) -> T + Send + Sync + 'static,
        T: Into<Transition>,
    {
        self.definitions.push((name.to_string(), erase(transition)));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub(crate) fn into_definitions(self) -> Vec<(String, ActionFn)> {
        self.definitions
    }
}

pub(crate) fn erase<F, T>(transition: F) -> ActionFn
where
    F: Fn(&Frozen, Value, Continuation) -> T + Send + Sync + 'static,
    T: Into<Transition>,
{
    Arc::new(move |state: &Frozen, payload: Value, next: Continuation| {
        transition(state, payload, next).into()
    })
}
